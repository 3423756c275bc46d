//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. Passwords never live in
//! the TOML; the CLI reads them from a flag or `DELIVER_PASSWORD`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Backend deployment settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the credential pair lives and when it counts as expiring
#[derive(Debug, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
    #[serde(default = "default_expiry_skew")]
    pub expiry_skew_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
            expiry_skew_secs: default_expiry_skew(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_expiry_skew() -> u64 {
    deliver_auth::DEFAULT_EXPIRY_SKEW.as_secs()
}

/// `$HOME/.config/deliver/credentials.json`, or the working directory without `HOME`.
fn default_credentials_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/deliver/credentials.json"),
        None => PathBuf::from("deliver-credentials.json"),
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// - `DELIVER_BASE_URL` replaces `api.base_url`
    /// - `DELIVER_CREDENTIALS` replaces `credentials.path`
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| common::Error::read(path, e))?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("DELIVER_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(path) = std::env::var("DELIVER_CREDENTIALS") {
            config.credentials.path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.credentials.expiry_skew_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("deliver.toml")
    }
}
