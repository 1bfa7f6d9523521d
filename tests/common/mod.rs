//! Shared integration-test scaffolding: an `AppState` wired to a temp-file
//! store and a `wiremock`-mocked backend standing in for the real
//! inference server, exercised through the router with
//! `tower::ServiceExt::oneshot` rather than a bound TCP listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tollgate::backend::BackendClient;
use tollgate::config::Config;
use tollgate::routes;
use tollgate::state::AppState;
use tollgate::store::Store;
use tower::ServiceExt;
use wiremock::MockServer;

pub const ADMIN_SECRET: &str = "test-admin-secret";

pub struct TestApp {
    pub state: AppState,
    pub mock_backend: MockServer,
    pub _tempdir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_concurrency(4).await
    }

    pub async fn with_concurrency(backend_max_concurrent: usize) -> Self {
        let mock_backend = MockServer::start().await;
        let tempdir = tempfile::tempdir().unwrap();
        let store = Store::open(tempdir.path().join("t.db"), 4).unwrap();

        let http_client = reqwest::Client::builder().build().unwrap();
        let backend = BackendClient::new(mock_backend.uri(), backend_max_concurrent, http_client);

        let config = Arc::new(Config {
            backend_url: mock_backend.uri(),
            backend_max_concurrent,
            admin_secret: Some(ADMIN_SECRET.to_string()),
            listen_host: "127.0.0.1".to_string(),
            listen_port: 0,
            store_path: tempdir.path().join("t.db").to_string_lossy().to_string(),
            pool_size: 4,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_image_mime: "image/png,image/jpeg".to_string(),
        });

        let state = AppState::new(store, backend, config);
        Self {
            state,
            mock_backend,
            _tempdir: tempdir,
        }
    }

    pub fn router(&self) -> axum::Router {
        routes::build(self.state.clone())
    }

    /// Creates a user directly against the store and returns their bearer credential.
    pub fn create_user(&self, id: &str) -> String {
        let api_key = tollgate::auth::generate_api_key(id);
        self.state.store.create_user(id, &api_key, 0).unwrap();
        api_key
    }
}

pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

pub fn bearer_json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}
