//! End-to-end authenticated send
//!
//! `send` runs the bounded two-step algorithm:
//!
//! 1. Pre-flight `refresh_if_needed`. A failed refresh means no usable
//!    credentials: return `AuthRequired` without touching the endpoint.
//! 2. Execute with the current access token, or none when anonymous.
//! 3. On `AuthRequired`, force one refresh and execute exactly once more.
//!    A second `AuthRequired` invalidates the stored credentials.
//!
//! So one `send` makes at most two exchanges against the target endpoint.

use std::time::Instant;

use deliver_auth::CredentialPair;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, Result};
use crate::executor::RequestExecutor;
use crate::metrics;
use crate::refresh::RefreshCoordinator;
use crate::request::{ExpectedResponse, RequestSpec};

/// The entry point callers send requests through.
///
/// Clones share the coordinator, so every clone joins the same refreshes.
#[derive(Clone)]
pub struct RequestPipeline {
    coordinator: RefreshCoordinator,
    executor: RequestExecutor,
}

impl RequestPipeline {
    pub fn new(coordinator: RefreshCoordinator, executor: RequestExecutor) -> Self {
        Self {
            coordinator,
            executor,
        }
    }

    /// Send one logical request, refreshing and retrying at most once.
    pub async fn send<R: ExpectedResponse>(&self, spec: &RequestSpec<R>) -> Result<R::Output> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let started = Instant::now();

        let result = self.send_with_retry(spec, request_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_request(outcome, started.elapsed().as_secs_f64());
        result
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %spec.method(), path = %spec.path()))]
    async fn send_with_retry<R: ExpectedResponse>(
        &self,
        spec: &RequestSpec<R>,
        request_id: String,
    ) -> Result<R::Output> {
        let current = match self.coordinator.refresh_if_needed().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "no usable credentials, not sending");
                return Err(ApiError::AuthRequired);
            }
        };

        let token = current.as_ref().map(CredentialPair::access_token);
        match self.executor.execute(spec, token).await {
            Err(ApiError::AuthRequired) => {}
            other => return other,
        }

        debug!(anonymous = token.is_none(), "access token rejected, forcing refresh");
        let refreshed = match self.coordinator.force_refresh().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "forced refresh failed");
                return Err(ApiError::AuthRequired);
            }
        };

        metrics::record_auth_retry();
        match self
            .executor
            .execute(spec, Some(refreshed.access_token()))
            .await
        {
            Err(ApiError::AuthRequired) => {
                warn!("request rejected again after refresh, invalidating credentials");
                self.coordinator
                    .invalidate_if_current(refreshed.access_token())
                    .await;
                Err(ApiError::AuthRequired)
            }
            other => other,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::request::Json;
    use crate::test_support::{
        MockBackend, MockConfig, ResourceBehavior, expired_pair, pair_expiring_in, store_with,
    };
    use axum::http::StatusCode;
    use deliver_auth::{CredentialStore, DEFAULT_EXPIRY_SKEW};

    fn pipeline(base_url: &str, store: Arc<CredentialStore>) -> RequestPipeline {
        let client = reqwest::Client::new();
        RequestPipeline::new(
            RefreshCoordinator::new(store, client.clone(), base_url, DEFAULT_EXPIRY_SKEW),
            RequestExecutor::new(client, base_url),
        )
    }

    fn active_orders() -> RequestSpec<Json<serde_json::Value>> {
        RequestSpec::get("/orders/active")
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        let backend = MockBackend::start(MockConfig {
            resource: ResourceBehavior::AcceptRefreshed,
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(pair_expiring_in(Duration::from_secs(3600)))).await;
        let pipeline = pipeline(&backend.base_url, store.clone());

        let orders = pipeline.send(&active_orders()).await.unwrap();

        assert_eq!(orders["token"], "at_new_1");
        assert_eq!(backend.resource_hits(), 2);
        assert_eq!(backend.refresh_hits(), 1);
        assert_eq!(store.load().await.unwrap().access_token(), "at_new_1");
    }

    #[tokio::test]
    async fn second_rejection_is_terminal_and_clears_credentials() {
        let backend = MockBackend::start(MockConfig {
            resource: ResourceBehavior::AlwaysReject,
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(pair_expiring_in(Duration::from_secs(3600)))).await;
        let pipeline = pipeline(&backend.base_url, store.clone());

        let err = pipeline.send(&active_orders()).await.unwrap_err();

        assert!(err.is_auth_required(), "got {err:?}");
        assert_eq!(backend.resource_hits(), 2);
        assert_eq!(backend.refresh_hits(), 1);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn second_rejection_spares_credentials_from_a_newer_login() {
        let backend = MockBackend::start(MockConfig {
            resource: ResourceBehavior::AlwaysReject,
            resource_delay: Duration::from_millis(200),
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(pair_expiring_in(Duration::from_secs(3600)))).await;
        let pipeline = pipeline(&backend.base_url, store.clone());

        let sending = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.send(&active_orders()).await })
        };
        // First attempt and refresh are done; the retry is still on the wire
        tokio::time::sleep(Duration::from_millis(300)).await;
        let login_pair = CredentialPair::new("at_login", "rt_login", u64::MAX);
        pipeline.coordinator().install(login_pair.clone()).await;

        let err = sending.await.unwrap().unwrap_err();
        assert!(err.is_auth_required(), "got {err:?}");
        assert_eq!(backend.resource_hits(), 2);
        assert_eq!(store.load().await, Some(login_pair));
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_before_sending() {
        let backend = MockBackend::start(MockConfig {
            resource: ResourceBehavior::AcceptRefreshed,
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(expired_pair())).await;
        let pipeline = pipeline(&backend.base_url, store);

        let orders = pipeline.send(&active_orders()).await.unwrap();

        assert_eq!(orders["token"], "at_new_1");
        assert_eq!(backend.resource_hits(), 1);
        assert_eq!(backend.refresh_hits(), 1);
    }

    #[tokio::test]
    async fn failed_preflight_refresh_skips_the_request() {
        let backend = MockBackend::start(MockConfig {
            refresh_status: StatusCode::UNAUTHORIZED,
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(expired_pair())).await;
        let pipeline = pipeline(&backend.base_url, store.clone());

        let err = pipeline.send(&active_orders()).await.unwrap_err();

        assert!(err.is_auth_required(), "got {err:?}");
        assert_eq!(backend.resource_hits(), 0);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn anonymous_request_goes_out_without_token() {
        let backend = MockBackend::start(MockConfig::default()).await;
        let pipeline = pipeline(&backend.base_url, store_with(None).await);

        let orders = pipeline.send(&active_orders()).await.unwrap();

        assert!(orders["token"].is_null());
        assert_eq!(backend.refresh_hits(), 0);
    }

    #[tokio::test]
    async fn anonymous_request_to_protected_endpoint_is_auth_required() {
        let backend = MockBackend::start(MockConfig {
            resource: ResourceBehavior::AcceptRefreshed,
            ..MockConfig::default()
        })
        .await;
        let pipeline = pipeline(&backend.base_url, store_with(None).await);

        let err = pipeline.send(&active_orders()).await.unwrap_err();

        assert!(err.is_auth_required(), "got {err:?}");
        assert_eq!(backend.resource_hits(), 1);
        assert_eq!(backend.refresh_hits(), 0);
    }

    #[tokio::test]
    async fn server_error_is_returned_without_retry() {
        let backend = MockBackend::start(MockConfig::default()).await;
        let store = store_with(Some(pair_expiring_in(Duration::from_secs(3600)))).await;
        let pipeline = pipeline(&backend.base_url, store.clone());

        let err = pipeline
            .send(&RequestSpec::<Json<serde_json::Value>>::get("/orders/broken"))
            .await
            .unwrap_err();

        match err {
            ApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Order service unavailable");
            }
            other => panic!("expected Server, got {other:?}"),
        }
        assert_eq!(backend.refresh_hits(), 0);
        assert!(store.load().await.is_some());
    }

    #[tokio::test]
    async fn not_found_is_returned_as_is() {
        let backend = MockBackend::start(MockConfig::default()).await;
        let pipeline = pipeline(&backend.base_url, store_with(None).await);

        let err = pipeline
            .send(&RequestSpec::<Json<serde_json::Value>>::get("/orders/999"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound), "got {err:?}");
    }

    #[tokio::test]
    async fn concurrent_sends_share_one_refresh() {
        let backend = MockBackend::start(MockConfig {
            refresh_delay: Duration::from_millis(150),
            resource: ResourceBehavior::AcceptRefreshed,
            ..MockConfig::default()
        })
        .await;
        let store = store_with(Some(expired_pair())).await;
        let pipeline = pipeline(&backend.base_url, store);

        let mut handles = vec![];
        for _ in 0..6 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline.send(&active_orders()).await
            }));
        }
        for h in handles {
            let orders = h.await.unwrap().unwrap();
            assert_eq!(orders["token"], "at_new_1");
        }

        assert_eq!(backend.refresh_hits(), 1);
        assert_eq!(backend.resource_hits(), 6);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let store = store_with(Some(pair_expiring_in(Duration::from_secs(3600)))).await;
        let pipeline = pipeline("http://127.0.0.1:1/api", store.clone());

        let err = pipeline.send(&active_orders()).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
        assert!(store.load().await.is_some());
    }
}
