//! DeliVer backend auth constants
//!
//! Paths are relative to the deployment's base URL (e.g.
//! `https://deliver.example.com/api`). The base URL itself is configuration.

use std::time::Duration;

/// Exchanges a refresh token for a new credential pair
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Email/password login
pub const LOGIN_PATH: &str = "/auth/login";

/// Account registration (returns a credential pair like login)
pub const REGISTER_PATH: &str = "/auth/register";

/// Requests a verification code by email
pub const VERIFY_EMAIL_SEND_PATH: &str = "/auth/verify-email/send";

/// Confirms a verification code (`code` and `email` as query parameters)
pub const VERIFY_EMAIL_CONFIRM_PATH: &str = "/auth/verify-email/confirm";

/// Profile of the authenticated user, used to validate a stored session
pub const CURRENT_USER_PATH: &str = "/users/me";

/// Access tokens are refreshed once they are within this window of expiring.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(5 * 60);

/// Join a base URL and an endpoint path without doubling the slash.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
