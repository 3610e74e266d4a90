//! The polling supervisor.
//!
//! One cycle per tick: authenticate, fetch, diff, deliver, persist. A failed
//! cycle puts the watcher into a cool-down that is longer than the poll
//! interval and forces re-authentication afterwards; the loop itself never
//! exits. Cycles are serialized by construction: a tick that fires while a
//! cycle is still running is skipped, not queued.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::diff;
use crate::sink::DeliverySink;
use crate::source::{Post, SessionManager, SourceError};
use crate::store::FileLedgerStore;

// ============================================================================
// Public API
// ============================================================================

/// Watch target and timing knobs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub account: String,
    pub fetch_count: usize,
    pub poll_interval: Duration,
    pub cooldown: Duration,
}

/// Which phase of a cycle failed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Auth(#[source] SourceError),

    #[error("fetch failed: {0}")]
    Fetch(#[source] SourceError),
}

/// What a completed cycle did.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First cycle for this account; the batch became the baseline and
    /// nothing was delivered.
    Baseline { size: usize },
    /// Nothing new since the previous snapshot.
    Unchanged,
    /// New posts were found and dispatched.
    Dispatched {
        delivered: usize,
        failed: usize,
        skipped_replies: usize,
    },
}

pub struct Watcher {
    session: SessionManager,
    ledger: FileLedgerStore,
    sink: Arc<dyn DeliverySink>,
    config: WatcherConfig,
    /// Previous cycle's batch, so the ledger file is read once per process.
    last_batch: Option<Vec<Post>>,
}

impl Watcher {
    pub fn new(
        session: SessionManager,
        ledger: FileLedgerStore,
        sink: Arc<dyn DeliverySink>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            session,
            ledger,
            sink,
            config,
            last_batch: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Run forever. Only process shutdown ends the loop.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(CycleOutcome::Baseline { size }) => {
                    info!(account = %self.config.account, size, "captured baseline snapshot");
                }
                Ok(CycleOutcome::Unchanged) => {
                    debug!(account = %self.config.account, "no new posts");
                }
                Ok(CycleOutcome::Dispatched {
                    delivered,
                    failed,
                    skipped_replies,
                }) => {
                    info!(
                        account = %self.config.account,
                        delivered,
                        failed,
                        skipped_replies,
                        "cycle complete"
                    );
                }
                Err(e) => {
                    warn!(
                        account = %self.config.account,
                        error = %e,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "cycle failed, cooling down"
                    );
                    self.cool_down().await;
                }
            }
        }
    }

    /// The failure path: wait out the cool-down, then force the next cycle
    /// to re-authenticate instead of retrying a possibly dead session.
    pub async fn cool_down(&mut self) {
        tokio::time::sleep(self.config.cooldown).await;
        self.session.invalidate();
    }

    /// One complete cycle: authenticate, fetch, diff, deliver, persist.
    ///
    /// The ledger is only written at the end of a successful diff and
    /// delivery pass, never mid-batch; a failed cycle leaves all state
    /// untouched.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.session
            .ensure_authenticated()
            .await
            .map_err(CycleError::Auth)?;

        let batch = self
            .session
            .fetch_latest(&self.config.account, self.config.fetch_count)
            .await
            .map_err(CycleError::Fetch)?;

        if batch.is_empty() {
            debug!(account = %self.config.account, "source returned an empty batch");
            return Ok(CycleOutcome::Unchanged);
        }

        let previous = match self.last_batch.take() {
            Some(cached) => Some(cached),
            None => match self.ledger.load(&self.config.account).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "failed to read ledger snapshot, re-baselining");
                    None
                }
            },
        };

        // First cycle for this account: record the baseline, deliver nothing.
        if previous.as_deref().is_none_or(|seen| seen.is_empty()) {
            if let Err(e) = self.ledger.store(&self.config.account, &batch).await {
                warn!(error = %e, "failed to write baseline snapshot");
            }
            let size = batch.len();
            self.last_batch = Some(batch);
            return Ok(CycleOutcome::Baseline { size });
        }

        let fresh = diff::new_posts(previous.as_deref(), &batch);
        if fresh.is_empty() {
            self.last_batch = Some(batch);
            return Ok(CycleOutcome::Unchanged);
        }

        let mut delivered = 0;
        let mut failed = 0;
        let mut skipped_replies = 0;
        for post in &fresh {
            if post.is_reply {
                debug!(post_id = %post.id, "skipping reply");
                skipped_replies += 1;
                continue;
            }
            match self.sink.deliver(post).await {
                Ok(()) => {
                    info!(post_id = %post.id, "delivered post");
                    delivered += 1;
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "delivery failed, continuing batch");
                    failed += 1;
                }
            }
        }

        // The snapshot is the whole fetched batch, failures included; a
        // post whose delivery failed counts as seen and is not retried.
        if let Err(e) = self.ledger.store(&self.config.account, &batch).await {
            warn!(error = %e, "failed to write ledger snapshot, a restart may re-deliver");
        }
        self.last_batch = Some(batch);

        Ok(CycleOutcome::Dispatched {
            delivered,
            failed,
            skipped_replies,
        })
    }
}
