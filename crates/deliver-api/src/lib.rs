//! Authenticated request pipeline for the DeliVer backend
//!
//! Wiring, leaf first:
//! - `RequestExecutor`: one HTTP exchange, bearer token handed in, response classified
//! - `RefreshCoordinator`: single-flight refresh and the only writer of the credential store
//! - `RequestPipeline`: pre-flight refresh, execute, one forced refresh and one retry
//! - `Session`: login, registration, logout, email verification, status
//!
//! Everything is built once and injected; there are no process-wide singletons.

pub mod error;
pub mod executor;
pub mod metrics;
pub mod pipeline;
pub mod refresh;
pub mod request;
pub mod session;

#[cfg(test)]
mod test_support;

pub use error::{ApiError, RefreshError, Result, SessionError};
pub use executor::{RequestExecutor, decode_response};
pub use pipeline::RequestPipeline;
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use request::{ExpectedResponse, Json, NoContent, PlainText, RequestSpec};
pub use session::{AuthState, Session, UserProfile};
