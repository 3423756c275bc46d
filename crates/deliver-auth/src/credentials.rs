//! Credential storage for the signed-in user
//!
//! Holds a single access/refresh token pair plus its absolute expiry. All
//! writes use atomic temp-file + rename at mode 0600. A tokio Mutex guards the
//! in-memory copy, so a reader either sees the previous pair or the new one,
//! never a mix.
//!
//! Storage failures never reach the caller: an unreadable or corrupt file
//! loads as "no credentials", and failed writes are logged while the
//! in-memory state keeps serving the process.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::token::TokenResponse;

/// Current wall clock as unix milliseconds.
pub fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Access token, refresh token and expiry, always stored together.
///
/// `expires` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed from `TokenResponse.expires_in` plus the time the response was
/// received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    access: Secret<String>,
    refresh: Secret<String>,
    expires: u64,
}

impl CredentialPair {
    pub fn new(
        access: impl Into<Secret<String>>,
        refresh: impl Into<Secret<String>>,
        expires_at_millis: u64,
    ) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
            expires: expires_at_millis,
        }
    }

    /// Build a pair from a token endpoint response received at `now_millis`.
    pub fn from_token_response(response: TokenResponse, now_millis: u64) -> Self {
        let expires = now_millis.saturating_add(response.expires_in.saturating_mul(1000));
        Self::new(response.token, response.refresh_token, expires)
    }

    pub fn access_token(&self) -> &str {
        self.access.expose()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh.expose()
    }

    /// Expiry as unix milliseconds.
    pub fn expires_at(&self) -> u64 {
        self.expires
    }

    /// `true` once `now >= expires_at - skew`.
    pub fn is_expiring_soon(&self, skew: Duration, now_millis: u64) -> bool {
        let threshold = self.expires.saturating_sub(skew.as_millis() as u64);
        now_millis >= threshold
    }

    /// Both tokens must be non-empty for the pair to authenticate anything.
    fn is_complete(&self) -> bool {
        !self.access.expose().is_empty() && !self.refresh.expose().is_empty()
    }
}

/// Durable home of the user's credential pair.
///
/// `path: None` is an in-memory store (tests, ephemeral sessions).
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<Option<CredentialPair>>,
}

impl CredentialStore {
    /// Open the credential file at `path`.
    ///
    /// A missing file is a signed-out user. An unreadable or malformed file is
    /// logged and also treated as signed out; it gets replaced on the next save.
    pub async fn open(path: PathBuf) -> Self {
        let state = read_pair(&path).await;
        info!(
            path = %path.display(),
            signed_in = state.is_some(),
            "opened credential store"
        );
        Self {
            path: Some(path),
            state: Mutex::new(state),
        }
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(None),
        }
    }

    /// Replace the stored pair and persist it.
    pub async fn save(&self, pair: CredentialPair) {
        let mut state = self.state.lock().await;
        if let Some(path) = &self.path
            && let Err(e) = write_atomic(path, &pair).await
        {
            warn!(error = %e, "failed to persist credentials, keeping them in memory only");
        }
        *state = Some(pair);
        debug!("saved credentials");
    }

    /// Clone of the stored pair, if any.
    pub async fn load(&self) -> Option<CredentialPair> {
        self.state.lock().await.clone()
    }

    /// Forget the stored pair. Safe to call when nothing is stored.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "removed credential file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "failed to remove credential file"),
            }
        }
        *state = None;
    }

    /// Whether a refresh is due: no stored pair also counts as due.
    pub async fn is_expiring_soon(&self, skew: Duration) -> bool {
        match self.state.lock().await.as_ref() {
            Some(pair) => pair.is_expiring_soon(skew, unix_millis_now()),
            None => true,
        }
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

async fn read_pair(path: &Path) -> Option<CredentialPair> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "credential file unreadable, treating as signed out");
            return None;
        }
    };

    match serde_json::from_str::<CredentialPair>(&contents) {
        Ok(pair) if pair.is_complete() => Some(pair),
        Ok(_) => {
            warn!(path = %path.display(), "credential file holds an incomplete pair, treating as signed out");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "credential file corrupt, treating as signed out");
            None
        }
    }
}

/// Write the pair to `path` atomically.
///
/// Writes to a temporary file in the same directory, then renames it over the
/// target, so a crash mid-write leaves the previous file intact. The temp file
/// is created 0600, so the tokens are never readable by others, even briefly.
async fn write_atomic(path: &Path, pair: &CredentialPair) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(pair).map_err(std::io::Error::other)?;

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    // A leftover temp file keeps its old mode when reopened; start from scratch.
    match tokio::fs::remove_file(&tmp_path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
