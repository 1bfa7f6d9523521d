//! End-to-end tests driving the full router (auth → rate-limit →
//! pipeline → usage tracking) against a `wiremock`-mocked backend, per
//! spec §8's testable scenarios.

mod common;

use axum::http::StatusCode;
use common::{bearer_json_request, send, TestApp};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn buffered_chat_request(model: &str) -> serde_json::Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "hello"}],
        "stream": false,
    })
}

/// S2: a buffered completion's cost is frozen at the price in effect when
/// the usage row is written; a later price change never alters it.
#[tokio::test]
async fn buffered_completion_records_cost_from_the_current_price() {
    let app = TestApp::new().await;
    let token = app.create_user("alice");

    app.state
        .price_book
        .set(
            "m1",
            tollgate::store::models::PriceRow {
                input_cost_per_million: 1.0,
                output_cost_per_million: 2.0,
            },
            "admin",
            0,
        )
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "m1",
            "message": {"role": "assistant", "content": "hi there"},
            "done": true,
            "prompt_eval_count": 1_000_000,
            "eval_count": 500_000,
        })))
        .mount(&app.mock_backend)
        .await;

    let router = app.router();
    let (status, body) = send(
        &router,
        bearer_json_request("POST", "/v1/chat/completions", &token, buffered_chat_request("m1")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usage"]["prompt_tokens"], 1_000_000);
    assert_eq!(body["usage"]["completion_tokens"], 500_000);

    let (status, usage) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/v1/usage")
            .header("authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["total_cost"], 2.0);

    // Changing price afterward must not retroactively alter the row just written.
    app.state
        .price_book
        .set(
            "m1",
            tollgate::store::models::PriceRow {
                input_cost_per_million: 10.0,
                output_cost_per_million: 20.0,
            },
            "admin",
            1,
        )
        .unwrap();
    let (_, usage_after) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/v1/usage")
            .header("authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(usage_after["total_cost"], 2.0);
}

/// S6: a model with no price-book row costs zero and is not an error.
#[tokio::test]
async fn completion_for_an_unpriced_model_costs_zero() {
    let app = TestApp::new().await;
    let token = app.create_user("alice");

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "unpriced",
            "message": {"role": "assistant", "content": "hi"},
            "done": true,
            "prompt_eval_count": 10,
            "eval_count": 5,
        })))
        .mount(&app.mock_backend)
        .await;

    let router = app.router();
    let (status, body) = send(
        &router,
        bearer_json_request("POST", "/v1/chat/completions", &token, buffered_chat_request("unpriced")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usage"]["total_tokens"], 15);

    let (_, usage) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/v1/usage")
            .header("authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(usage["total_cost"], 0.0);
}

/// S1: the (K+1)-th request inside a 60s window is rejected with a 429
/// naming the tripped dimension.
#[tokio::test]
async fn third_request_in_a_minute_is_rate_limited() {
    let app = TestApp::new().await;
    let token = app.create_user("alice");
    app.state
        .store
        .set_rate_limits(
            "alice",
            tollgate::store::models::RateLimits {
                requests_per_minute: Some(2),
                ..tollgate::store::models::RateLimits::unbounded()
            },
        )
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "m1",
            "message": {"role": "assistant", "content": "hi"},
            "done": true,
            "prompt_eval_count": 1,
            "eval_count": 1,
        })))
        .mount(&app.mock_backend)
        .await;

    let router = app.router();
    let req = || bearer_json_request("POST", "/v1/chat/completions", &token, buffered_chat_request("m1"));

    let (status_one, _) = send(&router, req()).await;
    let (status_two, _) = send(&router, req()).await;
    let (status_three, body_three) = send(&router, req()).await;

    assert_eq!(status_one, StatusCode::OK);
    assert_eq!(status_two, StatusCode::OK);
    assert_eq!(status_three, StatusCode::TOO_MANY_REQUESTS);
    assert!(body_three["error"]["message"]
        .as_str()
        .unwrap()
        .contains("requests per minute"));
}

/// S3: a streaming completion's penultimate frame carries nonzero usage,
/// the final frame is the terminator, and exactly one usage row exists.
#[tokio::test]
async fn streaming_completion_emits_usage_frame_then_terminator() {
    let app = TestApp::new().await;
    let token = app.create_user("alice");

    let ndjson = concat!(
        r#"{"model":"m1","message":{"role":"assistant","content":"hel"},"done":false}"#,
        "\n",
        r#"{"model":"m1","message":{"role":"assistant","content":"lo"},"done":false}"#,
        "\n",
        r#"{"model":"m1","done":true,"prompt_eval_count":10,"eval_count":5}"#,
        "\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ndjson.as_bytes().to_vec(), "application/x-ndjson"))
        .mount(&app.mock_backend)
        .await;

    let router = app.router();
    let mut request = buffered_chat_request("m1");
    request["stream"] = json!(true);

    let response = router
        .clone()
        .oneshot(bearer_json_request("POST", "/v1/chat/completions", &token, request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();

    assert_eq!(*frames.last().unwrap(), "data: [DONE]");
    let usage_frame = frames[frames.len() - 2];
    assert!(usage_frame.contains("\"usage\""));
    assert!(usage_frame.contains("\"prompt_tokens\":10"));
    assert!(usage_frame.contains("\"completion_tokens\":5"));

    let (_, usage) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/v1/usage")
            .header("authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(usage["request_count"], 1);
    assert_eq!(usage["total_tokens"], 15);
}

/// Admin surface rejects a valid user credential (spec §7: 403, not 401).
#[tokio::test]
async fn admin_path_rejects_a_user_credential() {
    let app = TestApp::new().await;
    let token = app.create_user("alice");
    let router = app.router();

    let (status, _) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/admin/users")
            .header("authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

/// Missing credential on a user route is unauthenticated, not forbidden.
#[tokio::test]
async fn missing_credential_is_unauthenticated() {
    let app = TestApp::new().await;
    let router = app.router();

    let response = router
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri("/v1/usage")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Invariant 2 (price history is strictly append-only) and invariant 4
/// (deleting a user removes exactly their usage and limit rows), both
/// driven through the admin surface with the real admin credential.
#[tokio::test]
async fn admin_surface_appends_price_history_and_cascades_user_deletion() {
    let app = TestApp::new().await;
    let router = app.router();
    let admin_req = |method: &str, uri: &str, body: serde_json::Value| {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", common::ADMIN_SECRET))
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    };

    let (status, _) = send(
        &router,
        admin_req("PUT", "/admin/pricing/m1", json!({"input_cost_per_million": 1.0, "output_cost_per_million": 2.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history_before) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/admin/pricing/m1/history")
            .header("authorization", format!("Bearer {}", common::ADMIN_SECRET))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(history_before.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &router,
        admin_req(
            "PUT",
            "/admin/pricing/m1",
            json!({"input_cost_per_million": 10.0, "output_cost_per_million": 20.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history_after) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/admin/pricing/m1/history")
            .header("authorization", format!("Bearer {}", common::ADMIN_SECRET))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(history_after.as_array().unwrap().len(), 2);

    // User deletion cascades to usage and limit rows, leaving other users untouched.
    app.create_user("alice");
    let bob_token = app.create_user("bob");
    app.state
        .store
        .insert_usage(tollgate::store::models::UsageInsert {
            user_id: "alice",
            model: "m1",
            input_tokens: 10,
            output_tokens: 5,
            cost: 0.0,
            request_id: "r1",
            prompt_preview: "hi",
            timestamp: 0,
        })
        .unwrap();
    app.state
        .store
        .insert_usage(tollgate::store::models::UsageInsert {
            user_id: "bob",
            model: "m1",
            input_tokens: 20,
            output_tokens: 5,
            cost: 0.0,
            request_id: "r2",
            prompt_preview: "hi",
            timestamp: 0,
        })
        .unwrap();

    let (status, _) = send(
        &router,
        axum::http::Request::builder()
            .method("DELETE")
            .uri("/admin/users/alice")
            .header("authorization", format!("Bearer {}", common::ADMIN_SECRET))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(app.state.store.usage_history("alice", 100, 0).unwrap().is_empty());
    assert_eq!(app.state.store.usage_history("bob", 100, 0).unwrap().len(), 1);

    let (_, bob_usage) = send(
        &router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/v1/usage")
            .header("authorization", format!("Bearer {bob_token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(bob_usage["request_count"], 1);
}

/// Spec §3 invariant: user id and credential uniqueness. Re-creating an
/// existing user id is a client error (400), not a store-level 500.
#[tokio::test]
async fn creating_a_duplicate_user_id_is_a_client_error_not_a_server_error() {
    let app = TestApp::new().await;
    let router = app.router();
    let admin_req = |body: serde_json::Value| {
        axum::http::Request::builder()
            .method("POST")
            .uri("/admin/users")
            .header("authorization", format!("Bearer {}", common::ADMIN_SECRET))
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    };

    let (status, _) = send(&router, admin_req(json!({"id": "alice"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, admin_req(json!({"id": "alice"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}
