//! Retention janitor for the object store
//!
//! A single background task sweeps the bucket on a fixed interval and deletes
//! every object whose store-reported last-modified time is at least
//! [`RetentionPolicy::max_age`] in the past. No state is kept between sweeps.
//!
//! Sweeps never overlap: they run one after another on the same task, and
//! ticks that fall due while a sweep is still running are skipped. Each sweep
//! is bounded by [`RetentionPolicy::sweep_timeout`]. A bad listing entry or a
//! failed delete is logged and counted, and the sweep moves on.

use crate::storage::BlobStore;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Retention and scheduling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Objects at least this old are deleted
    pub max_age: Duration,
    /// Time between sweeps
    pub interval: Duration,
    /// Upper bound for a single sweep
    pub sweep_timeout: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60 * 60),
            interval: Duration::from_secs(15 * 60),
            sweep_timeout: Duration::from_secs(20),
        }
    }
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries listed successfully
    pub scanned: usize,
    /// Keys deleted, in listing order
    pub deleted: Vec<String>,
    /// Entries younger than the threshold
    pub retained: usize,
    pub listing_errors: usize,
    pub delete_errors: usize,
    /// The sweep hit its timeout before finishing the listing
    pub timed_out: bool,
}

/// Time-driven reaper over a [`BlobStore`]
pub struct Janitor {
    store: Arc<dyn BlobStore>,
    policy: RetentionPolicy,
}

impl Janitor {
    pub fn new(store: Arc<dyn BlobStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Sweep once using the current wall-clock time
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep once, computing ages relative to `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let bounded = tokio::time::timeout(self.policy.sweep_timeout, self.sweep_into(now, &mut report));
        if bounded.await.is_err() {
            report.timed_out = true;
            warn!(
                bucket = self.store.bucket(),
                timeout_ms = self.policy.sweep_timeout.as_millis() as u64,
                "sweep timed out"
            );
        }

        info!(
            bucket = self.store.bucket(),
            scanned = report.scanned,
            deleted = report.deleted.len(),
            retained = report.retained,
            listing_errors = report.listing_errors,
            delete_errors = report.delete_errors,
            "sweep finished"
        );
        report
    }

    async fn sweep_into(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let max_age = chrono::Duration::from_std(self.policy.max_age)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));

        let mut listing = self.store.list();
        while let Some(item) = listing.next().await {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    report.listing_errors += 1;
                    warn!(error = %err, "skipping unreadable object");
                    continue;
                }
            };
            report.scanned += 1;

            let age = entry.age_at(now);
            if age < max_age {
                report.retained += 1;
                continue;
            }

            match self.store.delete(&entry.key).await {
                Ok(()) => {
                    debug!(key = %entry.key, age_secs = age.num_seconds(), "deleted expired object");
                    report.deleted.push(entry.key);
                }
                Err(err) => {
                    report.delete_errors += 1;
                    error!(key = %entry.key, error = %err, "failed to remove expired object");
                }
            }
        }
    }

    /// Run sweeps in the background until the returned handle is shut down
    /// or dropped.
    ///
    /// The first sweep happens one interval after start.
    pub fn spawn(self) -> JanitorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let period = self.policy.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                bucket = self.store.bucket(),
                interval_secs = period.as_secs(),
                max_age_secs = self.policy.max_age.as_secs(),
                "janitor started"
            );

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }

            info!(bucket = self.store.bucket(), "janitor stopped");
        });

        JanitorHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Owner of a running janitor task
#[derive(Debug)]
pub struct JanitorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop after the current sweep, if any, and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(err) = (&mut self.task).await {
            error!(error = %err, "janitor task failed");
        }
    }
}
