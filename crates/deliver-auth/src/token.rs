//! Calls against the DeliVer auth endpoints
//!
//! Login, registration and refresh all answer with the same token response
//! (`{token, refreshToken, expiresIn}`). Email verification endpoints answer
//! with an empty body. None of these touch the credential store: persisting
//! the resulting pair is the caller's job.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    LOGIN_PATH, REFRESH_PATH, REGISTER_PATH, VERIFY_EMAIL_CONFIRM_PATH, VERIFY_EMAIL_SEND_PATH,
    endpoint_url,
};
use crate::envelope::ErrorEnvelope;
use crate::error::{Error, Result};

/// Response from login, register and refresh.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Password is a `Secret`: redacted in Debug, sent as a plain JSON string.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Debug, Serialize)]
struct EmailVerificationRequest<'a> {
    email: &'a str,
}

/// Exchange a refresh token for a new token response.
///
/// Anything but a 200 is a rejection, whatever the status. A 200 whose body
/// does not carry both tokens is a `TokenExchange` error.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint_url(base_url, REFRESH_PATH))
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.bytes().await.unwrap_or_default();
        return Err(Error::Rejected {
            status: status.as_u16(),
            message: ErrorEnvelope::message_or_default(&body),
        });
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;
    validate(token)
}

/// Log in with email and password.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    request: &LoginRequest,
) -> Result<TokenResponse> {
    debug!(email = %request.email, "logging in");
    post_for_token(client, base_url, LOGIN_PATH, request).await
}

/// Create an account; the backend signs the new user in immediately.
pub async fn register(
    client: &reqwest::Client,
    base_url: &str,
    request: &RegisterRequest,
) -> Result<TokenResponse> {
    debug!(email = %request.email, username = %request.username, "registering");
    post_for_token(client, base_url, REGISTER_PATH, request).await
}

/// Ask the backend to email a verification code.
pub async fn send_email_verification(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
) -> Result<()> {
    let response = client
        .post(endpoint_url(base_url, VERIFY_EMAIL_SEND_PATH))
        .json(&EmailVerificationRequest { email })
        .send()
        .await
        .map_err(|e| Error::Http(format!("verification request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(Error::Server {
            status: status.as_u16(),
            message: ErrorEnvelope::message_or_default(&body),
        });
    }
    Ok(())
}

/// Confirm a verification code. Only a 200 counts as confirmed.
pub async fn confirm_email_verification(
    client: &reqwest::Client,
    base_url: &str,
    code: &str,
    email: &str,
) -> Result<()> {
    let response = client
        .post(endpoint_url(base_url, VERIFY_EMAIL_CONFIRM_PATH))
        .query(&[("code", code), ("email", email)])
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await
        .map_err(|e| Error::Http(format!("verification confirm failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::VerificationFailed(status.as_u16()));
    }
    Ok(())
}

async fn post_for_token<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    body: &B,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint_url(base_url, path))
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("{path} request failed: {e}")))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("{path} response read failed: {e}")))?;

    if !status.is_success() {
        return Err(Error::Server {
            status: status.as_u16(),
            message: ErrorEnvelope::message_or_default(&bytes),
        });
    }

    let token = serde_json::from_slice::<TokenResponse>(&bytes)
        .map_err(|e| Error::TokenExchange(format!("invalid {path} response: {e}")))?;
    validate(token)
}

fn validate(token: TokenResponse) -> Result<TokenResponse> {
    if token.token.is_empty() || token.refresh_token.is_empty() {
        return Err(Error::TokenExchange(
            "token response is missing a token".into(),
        ));
    }
    Ok(token)
}
