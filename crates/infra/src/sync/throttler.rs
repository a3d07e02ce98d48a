//! Sync throttler
//!
//! Rate-limited writer pushing the canonical record to the remote store.
//! Holds at most one pending task per calendar day (superseding updates
//! replace the queued task), coalesces bursts of local accepts into one
//! write of the latest state, and drops failed writes: the next accepted
//! local update re-arms sync. Join handles are tracked and cancellation is
//! explicit so stop() leaves nothing running.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use stridearc_core::{RemoteStepStore, SyncQueue};
use stridearc_domain::{RemoteStepFields, Result as DomainResult, SyncTask};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync throttler.
#[derive(Debug, Clone)]
pub struct SyncThrottlerConfig {
    /// Minimum interval between actual network writes.
    pub min_interval: Duration,
    /// Worker wake-up cadence; bounds how late a due write can start.
    pub tick_interval: Duration,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for SyncThrottlerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10),
            tick_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(5),
        }
    }
}

type PendingTasks = Arc<Mutex<BTreeMap<NaiveDate, SyncTask>>>;
type KnownRemote = Arc<Mutex<HashSet<(String, NaiveDate)>>>;

/// Rate-limited remote writer with explicit lifecycle management.
pub struct SyncThrottler {
    store: Arc<dyn RemoteStepStore>,
    pending: PendingTasks,
    known_remote: KnownRemote,
    config: SyncThrottlerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncThrottler {
    pub fn new(store: Arc<dyn RemoteStepStore>, config: SyncThrottlerConfig) -> Self {
        Self {
            store,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            known_remote: Arc::new(Mutex::new(HashSet::new())),
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background write loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting sync throttler");
        self.cancellation = CancellationToken::new();

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let known_remote = Arc::clone(&self.known_remote);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::write_loop(store, pending, known_remote, config, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("Sync throttler started");

        Ok(())
    }

    /// Stop the worker and wait for the write loop to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync throttler");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(self.config.join_timeout, handle).await.map_err(|_| {
                SchedulerError::Timeout { seconds: self.config.join_timeout.as_secs() }
            })?
            .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Sync throttler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Number of tasks waiting for a write slot. For diagnostics and tests.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Background write loop. One write per elapsed `min_interval`, oldest
    /// date first so a record from before rollover completes against its
    /// own date key.
    async fn write_loop(
        store: Arc<dyn RemoteStepStore>,
        pending: PendingTasks,
        known_remote: KnownRemote,
        config: SyncThrottlerConfig,
        cancel: CancellationToken,
    ) {
        let mut last_write: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync write loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.tick_interval) => {
                    let due = last_write
                        .map(|at| at.elapsed() >= config.min_interval)
                        .unwrap_or(true);
                    if !due {
                        continue;
                    }
                    if Self::flush_next(&store, &pending, &known_remote).await {
                        last_write = Some(Instant::now());
                    }
                }
            }
        }
    }

    /// Write the oldest pending task, if any. Returns whether a network
    /// write was attempted.
    async fn flush_next(
        store: &Arc<dyn RemoteStepStore>,
        pending: &PendingTasks,
        known_remote: &KnownRemote,
    ) -> bool {
        let task = {
            let mut pending = pending.lock();
            pending.pop_first().map(|(_, task)| task)
        };
        let Some(task) = task else {
            return false;
        };

        let date = task.record.date;
        let key = (task.user_id.clone(), date);

        // The remote row must exist before a value lands on it; create it
        // lazily via the idempotent upsert when it is missing.
        if !known_remote.lock().contains(&key) {
            match store.exists(&task.user_id, date).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(user_id = %task.user_id, date = %date, "Creating remote day record");
                }
                Err(err) => {
                    warn!(
                        user_id = %task.user_id,
                        date = %date,
                        error = %err,
                        "Remote existence check failed; dropping sync task"
                    );
                    return true;
                }
            }
        }

        let fields = RemoteStepFields::from(&task.record);
        match store.upsert(&task.user_id, date, &fields).await {
            Ok(()) => {
                known_remote.lock().insert(key);
                debug!(
                    user_id = %task.user_id,
                    date = %date,
                    total_steps = fields.total_steps,
                    "Synced step record"
                );
            }
            Err(err) => {
                // Log and drop: no backoff queue. The next accepted local
                // update enqueues a fresh task with newer state anyway.
                warn!(
                    user_id = %task.user_id,
                    date = %date,
                    error = %err,
                    "Remote sync failed; task dropped"
                );
            }
        }
        true
    }
}

#[async_trait]
impl SyncQueue for SyncThrottler {
    /// Idempotent per calendar day: the newest record for a date replaces
    /// whatever was queued for that date.
    async fn enqueue(&self, task: SyncTask) -> DomainResult<()> {
        let mut pending = self.pending.lock();
        let replaced = pending.insert(task.record.date, task).is_some();
        if replaced {
            debug!("Superseded queued sync task with newer record");
        }
        Ok(())
    }
}

impl Drop for SyncThrottler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncThrottler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
