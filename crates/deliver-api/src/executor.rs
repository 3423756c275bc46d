//! Single HTTP exchange with bearer token injection
//!
//! The executor sends exactly one request and classifies the response. It
//! never reads or writes credentials: the token to attach is handed in by
//! the pipeline.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tracing::{debug, warn};

use deliver_auth::{ErrorEnvelope, endpoint_url};

use crate::error::{ApiError, Result};
use crate::request::{ExpectedResponse, RequestSpec};

/// Sends requests against one deployment's base URL.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl RequestExecutor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Perform one exchange, attaching `Authorization: Bearer <token>` when a
    /// token is given. Anonymous requests go out without the header and the
    /// server decides.
    pub async fn execute<R: ExpectedResponse>(
        &self,
        spec: &RequestSpec<R>,
        access_token: Option<&str>,
    ) -> Result<R::Output> {
        let url = endpoint_url(&self.base_url, spec.path());

        let mut request = self
            .client
            .request(spec.method().clone(), &url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ApiError::InvalidRequest(format!("invalid token value: {e}")))?;
            request = request.header(AUTHORIZATION, value);
        }

        if let Some(body) = spec.body() {
            request = request.body(body.to_vec());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                ApiError::InvalidRequest(format!("{url}: {e}"))
            } else {
                ApiError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("reading response body: {e}")))?;

        debug!(status, bytes = body.len(), "received response");
        decode_response::<R>(status, &body)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Classify a status and body into a value or an `ApiError`.
///
/// - 401/403 → `AuthRequired`
/// - 404 → `NotFound`
/// - other non-2xx → `Server` with the envelope message when one decodes
/// - 2xx → the marker's decoder; a body that fails to decode but is an error
///   envelope becomes `Server`, otherwise `Decode`
pub fn decode_response<R: ExpectedResponse>(status: u16, body: &[u8]) -> Result<R::Output> {
    match status {
        200..=299 => {}
        401 | 403 => return Err(ApiError::AuthRequired),
        404 => return Err(ApiError::NotFound),
        _ => {
            return Err(ApiError::Server {
                status,
                message: ErrorEnvelope::message_or_default(body),
            });
        }
    }

    R::decode(body).map_err(|reason| {
        if let Some(envelope) = ErrorEnvelope::parse(body) {
            return ApiError::Server {
                status,
                message: envelope.message,
            };
        }
        warn!(
            status,
            error = %reason,
            body = %String::from_utf8_lossy(&body[..body.len().min(512)]),
            "response did not match expected shape"
        );
        ApiError::Decode(reason)
    })
}
