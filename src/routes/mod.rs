//! Router assembly (spec §4.8 middleware chain): correlation id → static
//! bypass (the two health paths) → authentication → rate-limit admission
//! → handler, wired the way the teacher composes `public_routes` /
//! `protected_routes` sub-routers with `route_layer` and merges them.

pub mod chat;
pub mod health;
pub mod user;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::auth::require_auth;
use crate::correlation::assign_correlation_id;
use crate::middleware::{rate_limit_gate, request_logging};
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state.clone());

    let user_routes = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/chat/completions/upload", post(chat::chat_completions_upload))
        .route("/v1/models", get(user::list_models))
        .route("/v1/usage", get(user::usage_totals))
        .route("/v1/usage/history", get(user::usage_history))
        .route("/v1/pricing", get(user::pricing))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_gate))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/users", post(admin::users::create_user).get(admin::users::list_users))
        .route("/admin/users/:user_id", delete(admin::users::delete_user))
        .route(
            "/admin/users/:user_id/limits",
            get(admin::limits::get_limits).put(admin::limits::put_limits),
        )
        .route("/admin/pricing", get(admin::pricing::list_prices))
        .route("/admin/pricing/:model", put(admin::pricing::set_price))
        .route("/admin/pricing/:model/history", get(admin::pricing::model_history))
        .route("/admin/pricing/history", get(admin::pricing::all_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(assign_correlation_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
