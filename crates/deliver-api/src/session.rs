//! Sign-in state on top of the pipeline
//!
//! Login and registration hand their token response to the coordinator's
//! `install`; logout goes through `invalidate`. The session never writes the
//! credential store itself.

use deliver_auth::{
    CURRENT_USER_PATH, CredentialPair, LoginRequest, RegisterRequest, Secret, unix_millis_now,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, SessionError};
use crate::pipeline::RequestPipeline;
use crate::request::{Json, RequestSpec};

/// The signed-in user as `GET /users/me` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// Signed in, but the email address still has to be confirmed
    NeedsVerification { email: String },
    Authenticated(UserProfile),
}

/// Account operations for one deployment.
#[derive(Clone)]
pub struct Session {
    pipeline: RequestPipeline,
}

impl Session {
    pub fn new(pipeline: RequestPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn login(&self, email: &str, password: Secret<String>) -> Result<(), SessionError> {
        let executor = self.pipeline.executor();
        let response = deliver_auth::login(
            executor.client(),
            executor.base_url(),
            &LoginRequest {
                email: email.to_string(),
                password,
            },
        )
        .await?;

        let pair = CredentialPair::from_token_response(response, unix_millis_now());
        self.pipeline.coordinator().install(pair).await;
        info!(email, "logged in");
        Ok(())
    }

    /// Create an account and sign in with it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: Secret<String>,
    ) -> Result<(), SessionError> {
        let executor = self.pipeline.executor();
        let response = deliver_auth::register(
            executor.client(),
            executor.base_url(),
            &RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password,
            },
        )
        .await?;

        let pair = CredentialPair::from_token_response(response, unix_millis_now());
        self.pipeline.coordinator().install(pair).await;
        info!(email, username, "registered");
        Ok(())
    }

    /// Forget local credentials. The backend has no logout endpoint.
    pub async fn logout(&self) {
        self.pipeline.coordinator().invalidate().await;
    }

    pub async fn send_email_verification(&self, email: &str) -> Result<(), SessionError> {
        let executor = self.pipeline.executor();
        deliver_auth::send_email_verification(executor.client(), executor.base_url(), email)
            .await?;
        Ok(())
    }

    pub async fn confirm_email_verification(
        &self,
        code: &str,
        email: &str,
    ) -> Result<(), SessionError> {
        let executor = self.pipeline.executor();
        deliver_auth::confirm_email_verification(
            executor.client(),
            executor.base_url(),
            code,
            email,
        )
        .await?;
        info!(email, "email verified");
        Ok(())
    }

    /// Where the user stands, asking the backend when credentials exist.
    ///
    /// A rejected session is logged out. Any other failure (offline, server
    /// error) is returned and leaves the credentials alone.
    pub async fn status(&self) -> Result<AuthState, SessionError> {
        if self.pipeline.coordinator().current().await.is_none() {
            return Ok(AuthState::Unauthenticated);
        }

        let spec = RequestSpec::<Json<UserProfile>>::get(CURRENT_USER_PATH);
        match self.pipeline.send(&spec).await {
            Ok(profile) if !profile.email_verified => Ok(AuthState::NeedsVerification {
                email: profile.email,
            }),
            Ok(profile) => Ok(AuthState::Authenticated(profile)),
            Err(ApiError::AuthRequired) => {
                warn!("session no longer accepted, logging out");
                self.logout().await;
                Ok(AuthState::Unauthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }
}
