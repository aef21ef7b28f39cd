//! Router configuration.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::IssuerState;

/// Create the issuer router.
///
/// # Routes
///
/// - `POST /auth/register` - Create an account and return tokens
/// - `POST /auth/login` - Return tokens for valid credentials
/// - `GET /auth/health` - Health check
pub fn create_router(state: IssuerState) -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::Utc;
    use serde_json::{json, Value};

    use edgeguard_auth::TokenVerifier;

    use crate::service::tests::{codec, fast_argon2};
    use crate::service::AuthService;
    use crate::store::InMemoryCredentialStore;

    fn server() -> TestServer {
        let service = AuthService::with_argon2(
            Arc::new(InMemoryCredentialStore::new()),
            codec(),
            fast_argon2(),
        );
        TestServer::new(create_router(IssuerState::new(service))).unwrap()
    }

    fn ada() -> Value {
        json!({
            "email": "ada@example.com",
            "password": "correct horse",
            "firstName": "Ada",
            "lastName": "Lovelace"
        })
    }

    #[tokio::test]
    async fn register_returns_created_tokens() {
        let server = server();
        let response = server.post("/auth/register").json(&ada()).await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["tokenType"], "Bearer");

        let access = body["accessToken"].as_str().unwrap();
        let identity = codec().verify(access, Utc::now()).unwrap();
        assert_eq!(identity.email(), "ada@example.com");
        assert!(identity.has_role("USER"));
    }

    #[tokio::test]
    async fn duplicate_register_conflicts() {
        let server = server();
        server.post("/auth/register").json(&ada()).await;

        let response = server.post("/auth/register").json(&ada()).await;
        response.assert_status(StatusCode::CONFLICT);

        let body: Value = response.json();
        assert_eq!(body["type"], "/errors/user-already-exists");
        assert_eq!(body["status"], 409);
    }

    #[tokio::test]
    async fn invalid_register_lists_field_errors() {
        let server = server();
        let response = server
            .post("/auth/register")
            .json(&json!({
                "email": "ada@example.com",
                "password": "short",
                "firstName": "Ada",
                "lastName": ""
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["title"], "Validation Error");
        assert_eq!(
            body["errors"],
            json!([
                "lastName: Last name is required",
                "password: Password must be at least 8 characters"
            ])
        );
    }

    #[tokio::test]
    async fn origin_prefixed_email_is_refused_before_storing() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthService::with_argon2(store.clone(), codec(), fast_argon2());
        let server = TestServer::new(create_router(IssuerState::new(service))).unwrap();

        let mut request = ada();
        request["email"] = json!("ip:1.2.3.4@example.com");
        let response = server.post("/auth/register").json(&request).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["errors"], json!(["email: Email must be valid"]));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let server = server();
        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "ada@example.com" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["type"], "/errors/validation-failed");
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn login_after_register() {
        let server = server();
        server.post("/auth/register").json(&ada()).await;

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["accessToken"].is_string());
        assert!(body["refreshToken"].is_string());
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let server = server();
        server.post("/auth/register").json(&ada()).await;

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "ada@example.com", "password": "battery staple" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["type"], "/errors/invalid-credentials");
        assert_eq!(body["detail"], "Invalid email or password");
        assert_eq!(body["title"], "Authentication Failed");
    }

    #[tokio::test]
    async fn health_is_up() {
        let server = server();
        let response = server.get("/auth/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "UP");
    }
}
