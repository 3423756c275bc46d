//! DeliVer authentication library
//!
//! Owns the credential pair (access token, refresh token, expiry), its
//! on-disk store, and the raw calls against the backend's auth endpoints.
//! It knows nothing about request retries or refresh coordination; those
//! live in `deliver-api`.
//!
//! Credential flow:
//! 1. `token::login()` / `token::register()` return a `TokenResponse`
//! 2. `CredentialPair::from_token_response()` turns it into an absolute expiry
//! 3. `CredentialStore::save()` persists the pair (0600, atomic rename)
//! 4. `token::refresh_token()` exchanges the refresh token when the pair expires
//! 5. `CredentialStore::clear()` on logout or irrecoverable refresh failure

pub mod constants;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod token;

pub use common::Secret;
pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore, unix_millis_now};
pub use envelope::{ErrorEnvelope, NO_SERVER_MESSAGE};
pub use error::{Error, Result};
pub use token::{
    LoginRequest, RegisterRequest, TokenResponse, confirm_email_verification, login,
    refresh_token, register, send_email_verification,
};
