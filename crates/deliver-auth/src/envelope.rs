//! Error envelope returned by the backend on non-2xx responses
//!
//! `{ "error": "...", "message": "...", "status": 400, "timestamp": "...", "path": "..." }`
//! Only `message` is required; it is the text surfaced to callers.

use serde::Deserialize;

/// Fallback text when a failure body carries no decodable envelope.
pub const NO_SERVER_MESSAGE: &str = "no error message from server";

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl ErrorEnvelope {
    /// Best-effort decode; `None` when the body is not an envelope.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The envelope message, or the fixed fallback text.
    pub fn message_or_default(body: &[u8]) -> String {
        Self::parse(body)
            .map(|envelope| envelope.message)
            .unwrap_or_else(|| NO_SERVER_MESSAGE.to_string())
    }
}
