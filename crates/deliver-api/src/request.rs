//! Request descriptions and expected-response markers
//!
//! A `RequestSpec<R>` is built once per call and never mutated. The marker
//! `R` says how a 2xx body is turned into a value:
//!
//! - `Json<T>`: decode into `T`; an empty body is a decode error
//! - `PlainText`: the body as a string, surrounding `"` trimmed, since some
//!   endpoints quote their plain-string payloads and some don't
//! - `NoContent`: empty body is `()`; a non-empty body only has to be JSON

use std::fmt;
use std::marker::PhantomData;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};

/// How a successful response body becomes a value.
pub trait ExpectedResponse {
    type Output;

    fn decode(body: &[u8]) -> std::result::Result<Self::Output, String>;
}

/// Decode the body as JSON into `T`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T: DeserializeOwned> ExpectedResponse for Json<T> {
    type Output = T;

    fn decode(body: &[u8]) -> std::result::Result<T, String> {
        if body.is_empty() {
            return Err("response was empty, but expected a value".into());
        }
        serde_json::from_slice(body).map_err(|e| {
            format!(
                "could not decode {}: {e}",
                std::any::type_name::<T>()
            )
        })
    }
}

/// A bare string payload, quoted or not.
pub struct PlainText;

impl ExpectedResponse for PlainText {
    type Output = String;

    fn decode(body: &[u8]) -> std::result::Result<String, String> {
        if body.is_empty() {
            return Err("response was empty, but expected a value".into());
        }
        let text =
            std::str::from_utf8(body).map_err(|e| format!("response is not UTF-8: {e}"))?;
        Ok(text.trim_matches('"').to_string())
    }
}

/// No meaningful payload.
pub struct NoContent;

impl ExpectedResponse for NoContent {
    type Output = ();

    fn decode(body: &[u8]) -> std::result::Result<(), String> {
        if body.is_empty() {
            return Ok(());
        }
        serde_json::from_slice::<serde_json::Value>(body)
            .map(|_| ())
            .map_err(|e| format!("expected no content, got a non-JSON body: {e}"))
    }
}

/// One logical call: method, path under the base URL, optional JSON body.
pub struct RequestSpec<R> {
    method: Method,
    path: String,
    body: Option<Vec<u8>>,
    _response: PhantomData<fn() -> R>,
}

impl<R: ExpectedResponse> RequestSpec<R> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            _response: PhantomData,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body, serialized once here.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::InvalidRequest(format!("unserializable body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Attach an already-serialized JSON body.
    pub fn with_raw_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

impl<R> fmt::Debug for RequestSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}
