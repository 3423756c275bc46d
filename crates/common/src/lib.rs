//! Common types for the DeliVer client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
