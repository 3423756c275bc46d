//! Error types for pipeline and refresh operations

/// Classified outcome of a failed request.
///
/// `AuthRequired` is the signal to route the user back to sign-in; every
/// other variant is a generic "try again" for the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response reached us
    #[error("transport error: {0}")]
    Transport(String),

    /// 2xx response whose body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// 401/403 that survived one refresh-and-retry, or no usable credentials
    #[error("authentication required")]
    AuthRequired,

    #[error("not found")]
    NotFound,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request could not be built (bad URL, unserializable body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ApiError::AuthRequired)
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Decode(_) => "decode",
            ApiError::AuthRequired => "auth_required",
            ApiError::NotFound => "not_found",
            ApiError::Server { .. } => "server",
            ApiError::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Why a refresh did not produce a new credential pair.
///
/// Every variant means "unauthenticated" to the pipeline. `Clone` because a
/// single outcome is handed to every caller waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("malformed refresh response: {0}")]
    Malformed(String),

    /// The refresh task died before producing an outcome
    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl RefreshError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::MissingRefreshToken => "missing_refresh_token",
            RefreshError::Rejected { .. } => "rejected",
            RefreshError::Transport(_) => "transport",
            RefreshError::Malformed(_) => "malformed",
            RefreshError::Aborted(_) => "aborted",
        }
    }
}

impl From<deliver_auth::Error> for RefreshError {
    fn from(err: deliver_auth::Error) -> Self {
        match err {
            deliver_auth::Error::Http(msg) => RefreshError::Transport(msg),
            deliver_auth::Error::Rejected { status, message }
            | deliver_auth::Error::Server { status, message } => {
                RefreshError::Rejected { status, message }
            }
            deliver_auth::Error::TokenExchange(msg) => RefreshError::Malformed(msg),
            deliver_auth::Error::VerificationFailed(status) => RefreshError::Rejected {
                status,
                message: "verification failed".into(),
            },
        }
    }
}

/// Failure of a session operation (login, registration, verification, status).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The auth endpoint refused, with the envelope message when there was one
    #[error("{message} ({status})")]
    Rejected { status: u16, message: String },

    #[error("email verification failed ({0})")]
    VerificationFailed(u16),
}

impl From<deliver_auth::Error> for SessionError {
    fn from(err: deliver_auth::Error) -> Self {
        match err {
            deliver_auth::Error::Http(msg) => SessionError::Api(ApiError::Transport(msg)),
            deliver_auth::Error::TokenExchange(msg) => SessionError::Api(ApiError::Decode(msg)),
            deliver_auth::Error::Rejected { status, message }
            | deliver_auth::Error::Server { status, message } => {
                SessionError::Rejected { status, message }
            }
            deliver_auth::Error::VerificationFailed(status) => {
                SessionError::VerificationFailed(status)
            }
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ApiError>;
