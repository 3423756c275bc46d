//! Error types for auth endpoint and credential operations

/// Errors from calls against the DeliVer auth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response reached us (connect, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The refresh endpoint answered with anything but 200
    #[error("refresh token rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 2xx from a token endpoint whose body was not a usable token response
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Non-2xx from login/register/verification, message from the error envelope
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("email verification failed ({0})")]
    VerificationFailed(u16),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
