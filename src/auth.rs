//! Authenticator (spec §4.5, component C5).
//!
//! Two distinct capabilities, chosen by route prefix rather than modeled
//! as a type hierarchy (spec §9 "two-credential auth → capability check,
//! not inheritance"): admin paths compare against the admin secret in
//! constant time, user paths resolve the bearer token to a user by exact
//! match in the store. The user identity embedded in the token's
//! `sk-{user_id}-{random}` shape is advisory only.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::User;

#[derive(Debug, Clone)]
pub enum Identity {
    User(User),
    Admin,
}

/// Mints a fresh credential in the `sk-{user_id}-{random}` shape (spec
/// §6): 16 random bytes is 128 bits of entropy, URL-safe base64 encoded.
pub fn generate_api_key(user_id: &str) -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let suffix = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    format!("sk-{user_id}-{suffix}")
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let is_admin_path = req.uri().path().starts_with("/admin");
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthenticated)?;

    let identity = if is_admin_path {
        if constant_time_eq(token.as_bytes(), state.config.admin_secret().as_bytes()) {
            Identity::Admin
        } else {
            return Err(AppError::Forbidden);
        }
    } else {
        let user = state.store.find_user_by_api_key(token)?.ok_or(AppError::Unauthenticated)?;
        Identity::User(user)
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Avoids leaking the admin secret's length or contents through timing —
/// the only place on the user path where request-time attacker feedback
/// on an exact-match comparison would matter.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secre"));
    }

    #[test]
    fn bearer_token_requires_the_prefix_and_a_nonempty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        let mut empty = HeaderMap::new();
        empty.insert(axum::http::header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&empty), None);

        let mut malformed = HeaderMap::new();
        malformed.insert(axum::http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&malformed), None);
    }
}
