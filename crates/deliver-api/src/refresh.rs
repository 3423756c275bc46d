//! Single-flight credential refresh
//!
//! At most one refresh exchange runs per coordinator. The first caller that
//! needs a refresh spawns it as its own task and parks a shared handle in the
//! in-flight slot; every caller arriving while it runs clones that handle and
//! receives the same outcome. The task clears the slot when it finishes.
//!
//! Because the exchange runs on a spawned task, a caller that gives up
//! (its future is dropped) never cancels a refresh other callers still wait on.
//!
//! The coordinator is the only writer of the credential store:
//! - a finished refresh saves the new pair, or clears the store on any failure
//! - `install` stores a pair obtained by login/registration
//! - `invalidate` clears the store on logout
//! - `invalidate_if_current` clears it after a terminal auth failure, unless
//!   the rejected token has been replaced meanwhile
//!
//! Writers are serialized by a write epoch. `install` and the invalidations
//! bump it; a refresh whose snapshot was taken under an older epoch drops its
//! result and reports whatever the store holds now.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deliver_auth::{CredentialPair, CredentialStore, unix_millis_now};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::metrics;

/// What every caller of one refresh receives.
pub type RefreshOutcome = std::result::Result<CredentialPair, RefreshError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Handle to the refresh currently running, shared by all its waiters.
struct InFlightRefresh {
    id: u64,
    outcome: SharedRefresh,
}

struct Inner {
    store: Arc<CredentialStore>,
    client: reqwest::Client,
    base_url: String,
    skew: Duration,
    in_flight: Mutex<Option<InFlightRefresh>>,
    epoch: Mutex<u64>,
    next_id: AtomicU64,
}

/// Coalesces concurrent refresh requests into one exchange.
///
/// Cheap to clone; clones share the same in-flight slot and store.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        client: reqwest::Client,
        base_url: impl Into<String>,
        skew: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client,
                base_url: base_url.into(),
                skew,
                in_flight: Mutex::new(None),
                epoch: Mutex::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Refresh when the stored access token is within the skew of expiring.
    ///
    /// - a refresh already running: wait for it and share its outcome
    /// - nothing stored: `Ok(None)` without touching the network
    /// - stored pair still fresh: `Ok(Some(current))`
    /// - otherwise start a refresh and wait for it
    ///
    /// The expiry check runs while holding the in-flight slot, so a caller
    /// arriving right after a refresh completed sees the new pair instead of
    /// starting another exchange.
    pub async fn refresh_if_needed(&self) -> Result<Option<CredentialPair>, RefreshError> {
        let pending = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(in_flight) => join(in_flight),
                None => {
                    let (epoch, current) = self.snapshot().await;
                    let Some(current) = current else {
                        return Ok(None);
                    };
                    if !current.is_expiring_soon(self.inner.skew, unix_millis_now()) {
                        return Ok(Some(current));
                    }
                    debug!(
                        expires_at = current.expires_at(),
                        "access token expiring soon, refreshing"
                    );
                    self.start(&mut slot, epoch, current)
                }
            }
        };
        pending.await.map(Some)
    }

    /// Refresh regardless of expiry, after the server rejected the access token.
    ///
    /// Joins a running refresh if there is one. Without a stored refresh token
    /// this fails with `MissingRefreshToken` and makes no network call.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(in_flight) => join(in_flight),
                None => {
                    let (epoch, current) = self.snapshot().await;
                    let Some(current) = current else {
                        return Err(RefreshError::MissingRefreshToken);
                    };
                    debug!("forcing refresh after rejected access token");
                    self.start(&mut slot, epoch, current)
                }
            }
        };
        pending.await
    }

    /// Store a pair obtained outside a refresh (login, registration).
    pub async fn install(&self, pair: CredentialPair) {
        let mut epoch = self.inner.epoch.lock().await;
        *epoch += 1;
        self.inner.store.save(pair).await;
        info!("installed new credentials");
    }

    /// Drop the stored credentials on logout.
    pub async fn invalidate(&self) {
        let mut epoch = self.inner.epoch.lock().await;
        *epoch += 1;
        self.inner.store.clear().await;
        info!("credentials invalidated");
    }

    /// Drop the stored credentials only if they still carry `access_token`.
    ///
    /// Used when a request is rejected even after a refresh: a pair installed
    /// since then (a fresh login) belongs to someone else and is kept.
    /// Returns whether the store was cleared.
    pub async fn invalidate_if_current(&self, access_token: &str) -> bool {
        let mut epoch = self.inner.epoch.lock().await;
        let matches = self
            .inner
            .store
            .load()
            .await
            .is_some_and(|pair| pair.access_token() == access_token);
        if !matches {
            debug!("stored credentials changed since the rejected request, keeping them");
            return false;
        }
        *epoch += 1;
        self.inner.store.clear().await;
        info!("credentials invalidated");
        true
    }

    /// The pair currently stored.
    pub async fn current(&self) -> Option<CredentialPair> {
        self.inner.store.load().await
    }

    /// Whether a refresh exchange is running right now.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// The write epoch and the stored pair, read together.
    ///
    /// Holding the epoch lock across the load means no `install`/`invalidate`
    /// can land between the two, so a refresh started from this pair is
    /// discarded if either runs later.
    async fn snapshot(&self) -> (u64, Option<CredentialPair>) {
        let epoch = self.inner.epoch.lock().await;
        let current = self.inner.store.load().await;
        (*epoch, current)
    }

    /// Spawn the exchange and park its shared handle in `slot`.
    ///
    /// `epoch` must come from the same `snapshot` as `current`.
    fn start(
        &self,
        slot: &mut Option<InFlightRefresh>,
        epoch: u64,
        current: CredentialPair,
    ) -> SharedRefresh {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move { inner.run_refresh(id, epoch, current).await });
        let outcome = task
            .map(|joined| {
                joined.unwrap_or_else(|e| Err(RefreshError::Aborted(e.to_string())))
            })
            .boxed()
            .shared();

        *slot = Some(InFlightRefresh {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }
}

fn join(in_flight: &InFlightRefresh) -> SharedRefresh {
    debug!(refresh_id = in_flight.id, "joining in-flight refresh");
    metrics::record_refresh_joined();
    in_flight.outcome.clone()
}

impl Inner {
    /// Body of the refresh task: one exchange, one store write, then free the slot.
    async fn run_refresh(&self, id: u64, started_epoch: u64, current: CredentialPair) -> RefreshOutcome {
        let exchanged =
            match deliver_auth::refresh_token(&self.client, &self.base_url, current.refresh_token())
                .await
            {
                Ok(response) => Ok(CredentialPair::from_token_response(
                    response,
                    unix_millis_now(),
                )),
                Err(e) => Err(RefreshError::from(e)),
            };

        let outcome = {
            let epoch = self.epoch.lock().await;
            if *epoch != started_epoch {
                info!(
                    refresh_id = id,
                    "credentials replaced during refresh, discarding exchange result"
                );
                self.store
                    .load()
                    .await
                    .ok_or(RefreshError::MissingRefreshToken)
            } else {
                match exchanged {
                    Ok(pair) => {
                        self.store.save(pair.clone()).await;
                        info!(refresh_id = id, expires_at = pair.expires_at(), "access token refreshed");
                        Ok(pair)
                    }
                    Err(e) => {
                        warn!(refresh_id = id, error = %e, "refresh failed, clearing credentials");
                        self.store.clear().await;
                        Err(e)
                    }
                }
            }
        };

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_refresh(label);

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
        outcome
    }
}
