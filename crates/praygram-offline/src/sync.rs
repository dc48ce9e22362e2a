use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{ActionKind, OfflineAction, OfflineStore, StoreError};

/// Per-request cap so a dead connection cannot hang a sync pass indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("offline store failed")]
    Store(#[from] StoreError),
    #[error("HTTP client setup failed")]
    Client(#[from] reqwest::Error),
}

/// What a call to `sync_offline_data` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full pass ran (individual item failures are logged, not fatal).
    Completed,
    /// Not connected; nothing attempted.
    SkippedOffline,
    /// Another pass is already running; this call did nothing.
    SkippedInFlight,
}

/// Replays offline-captured writes against the API. Best-effort at-least-once
/// per prayer; queued reaction actions that fail replay are dropped with the
/// rest of the queue at the end of the pass — the UX contract is that sync
/// never surfaces errors, so the failure is only logged.
pub struct SyncEngine {
    store: Arc<OfflineStore>,
    client: reqwest::Client,
    base_url: String,
    token: String,
    online: AtomicBool,
    in_flight: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        store: Arc<OfflineStore>,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            store,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            online: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Fed by the host's connectivity events.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Replay pending prayers and queued actions, then clean up. Safe to call
    /// from both a connectivity event and a view mount at once: the in-flight
    /// guard turns the second call into a no-op instead of double-submitting.
    pub async fn sync_offline_data(&self) -> Result<SyncOutcome, SyncError> {
        if !self.is_online() {
            return Ok(SyncOutcome::SkippedOffline);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync pass already in flight, skipping");
            return Ok(SyncOutcome::SkippedInFlight);
        }

        let result = self.run_pass().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(|_| SyncOutcome::Completed)
    }

    async fn run_pass(&self) -> Result<(), SyncError> {
        // Pending prayers, in capture order. A failed item stays unsynced for
        // the next pass; the rest of the batch continues.
        let pending: Vec<_> = self
            .store
            .offline_prayers()
            .into_iter()
            .filter(|p| !p.synced)
            .collect();

        for prayer in pending {
            let response = self
                .client
                .post(format!("{}/prayers", self.base_url))
                .bearer_auth(&self.token)
                .json(&prayer.draft)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    self.store.mark_synced(&prayer.id)?;
                }
                Ok(resp) => {
                    warn!("Failed to sync prayer {}: HTTP {}", prayer.id, resp.status());
                }
                Err(e) => {
                    warn!("Failed to sync prayer {}: {}", prayer.id, e);
                }
            }
        }

        // Queued actions, FIFO. Failures are logged and the action is dropped
        // with the queue below.
        for action in self.store.queue() {
            if let Err(e) = self.replay_action(&action).await {
                warn!("Failed to sync action {}: {}", action.id, e);
            }
        }

        self.store.remove_synced()?;
        self.store.clear_queue()?;

        Ok(())
    }

    async fn replay_action(&self, action: &OfflineAction) -> Result<(), reqwest::Error> {
        match action.kind {
            ActionKind::AddReaction => {
                self.client
                    .post(format!("{}/reactions", self.base_url))
                    .bearer_auth(&self.token)
                    .json(&action.data)
                    .send()
                    .await?
                    .error_for_status()?;
            }
            ActionKind::RemoveReaction => {
                let prayer_id = action.data["prayer_id"].as_str().unwrap_or_default();
                let kind = action.data["type"].as_str().unwrap_or("pray");
                self.client
                    .delete(format!("{}/reactions", self.base_url))
                    .query(&[("prayer_id", prayer_id), ("type", kind)])
                    .bearer_auth(&self.token)
                    .send()
                    .await?
                    .error_for_status()?;
            }
            ActionKind::CreatePrayer => {
                // Prayer creation replays through the offline prayer list, not
                // the queue; a queued copy would double-post.
                debug!("Skipping queued CREATE_PRAYER {}", action.id);
            }
        }
        Ok(())
    }
}
