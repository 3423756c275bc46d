//! In-process mock of the DeliVer backend for unit tests.
//!
//! Serves `/api/auth/refresh` and a handful of resource routes on a random
//! local port, counting hits so tests can assert how many exchanges happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use deliver_auth::{CredentialPair, CredentialStore, unix_millis_now};
use tokio::net::TcpListener;

/// How `/api/orders/active` treats the bearer token it receives.
#[derive(Clone, Copy, Debug)]
pub enum ResourceBehavior {
    /// 200 for everyone, token or not
    Open,
    /// 401 unless the token was minted by the mock refresh endpoint
    AcceptRefreshed,
    /// 401 no matter what
    AlwaysReject,
}

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub refresh_delay: Duration,
    pub refresh_status: StatusCode,
    /// Replaces the 200 refresh body when set
    pub refresh_body: Option<&'static str>,
    pub resource: ResourceBehavior,
    pub resource_delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(0),
            refresh_status: StatusCode::OK,
            refresh_body: None,
            resource: ResourceBehavior::Open,
            resource_delay: Duration::from_millis(0),
        }
    }
}

#[derive(Clone)]
struct MockState {
    config: MockConfig,
    refresh_hits: Arc<AtomicUsize>,
    resource_hits: Arc<AtomicUsize>,
}

pub struct MockBackend {
    pub base_url: String,
    refresh_hits: Arc<AtomicUsize>,
    resource_hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub async fn start(config: MockConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = MockState {
            config,
            refresh_hits: Arc::new(AtomicUsize::new(0)),
            resource_hits: Arc::new(AtomicUsize::new(0)),
        };
        let refresh_hits = state.refresh_hits.clone();
        let resource_hits = state.resource_hits.clone();

        let app = axum::Router::new()
            .route("/api/auth/refresh", post(refresh_handler))
            .route("/api/orders/active", get(resource_handler))
            .route("/api/users/me", get(profile_handler))
            .route("/api/auth/login", post(login_handler))
            .route("/api/auth/register", post(register_handler))
            .route("/api/auth/verify-email/send", post(|| async { StatusCode::OK }))
            .route("/api/auth/verify-email/confirm", post(confirm_handler))
            .route(
                "/api/orders/broken",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        r#"{"error":"Internal Server Error","message":"Order service unavailable","status":500}"#,
                    )
                }),
            )
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            refresh_hits,
            resource_hits,
        }
    }

    pub fn refresh_hits(&self) -> usize {
        self.refresh_hits.load(Ordering::SeqCst)
    }

    pub fn resource_hits(&self) -> usize {
        self.resource_hits.load(Ordering::SeqCst)
    }
}

async fn refresh_handler(State(state): State<MockState>) -> impl IntoResponse {
    let n = state.refresh_hits.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(state.config.refresh_delay).await;

    if state.config.refresh_status != StatusCode::OK {
        return (
            state.config.refresh_status,
            r#"{"message":"Invalid refresh token"}"#.to_string(),
        );
    }
    if let Some(body) = state.config.refresh_body {
        return (StatusCode::OK, body.to_string());
    }
    (
        StatusCode::OK,
        format!(r#"{{"token":"at_new_{n}","refreshToken":"rt_new_{n}","expiresIn":3600}}"#),
    )
}

async fn login_handler(axum::Json(body): axum::Json<serde_json::Value>) -> impl IntoResponse {
    if body["password"] != "hunter2" {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"error":"Unauthorized","message":"Invalid email or password","status":401}"#
                .to_string(),
        );
    }
    (
        StatusCode::OK,
        r#"{"token":"at_login","refreshToken":"rt_login","expiresIn":3600}"#.to_string(),
    )
}

async fn register_handler(axum::Json(body): axum::Json<serde_json::Value>) -> impl IntoResponse {
    if body["username"] == "taken" {
        return (
            StatusCode::CONFLICT,
            r#"{"error":"Conflict","message":"Username already exists","status":409}"#.to_string(),
        );
    }
    (
        StatusCode::OK,
        r#"{"token":"at_unverified_reg","refreshToken":"rt_reg","expiresIn":3600}"#.to_string(),
    )
}

async fn confirm_handler(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> StatusCode {
    let valid = params.get("code").is_some_and(|c| c == "123456")
        && params.get("email").is_some_and(|e| e == "eren@deliver.app");
    if valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    match state.config.resource {
        ResourceBehavior::Open => true,
        ResourceBehavior::AcceptRefreshed => {
            bearer(headers).is_some_and(|token| token.starts_with("at_new_"))
        }
        ResourceBehavior::AlwaysReject => false,
    }
}

async fn resource_handler(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    state.resource_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.config.resource_delay).await;
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Full authentication is required"}"#.to_string(),
        );
    }
    let body = serde_json::json!({ "orders": [], "token": bearer(&headers) });
    (StatusCode::OK, body.to_string())
}

async fn profile_handler(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Full authentication is required"}"#.to_string(),
        );
    }
    let verified = bearer(&headers).is_some_and(|token| !token.contains("unverified"));
    let body = serde_json::json!({
        "id": 17,
        "username": "eren",
        "email": "eren@deliver.app",
        "role": "CUSTOMER",
        "emailVerified": verified,
    });
    (StatusCode::OK, body.to_string())
}

/// A pair whose access token expires `delta` from now.
pub fn pair_expiring_in(delta: Duration) -> CredentialPair {
    CredentialPair::new(
        "at_stale",
        "rt_stale",
        unix_millis_now() + delta.as_millis() as u64,
    )
}

/// A pair that expired long ago.
pub fn expired_pair() -> CredentialPair {
    CredentialPair::new("at_stale", "rt_stale", 1)
}

pub async fn store_with(pair: Option<CredentialPair>) -> Arc<CredentialStore> {
    let store = CredentialStore::in_memory();
    if let Some(pair) = pair {
        store.save(pair).await;
    }
    Arc::new(store)
}
