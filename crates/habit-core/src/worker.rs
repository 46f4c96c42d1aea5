//! Background persistence worker
//!
//! The reading engine never waits on storage. Writes are queued on an
//! unbounded channel and applied one at a time by a single task, so two
//! flushes for the same day can never interleave. After each burst of writes
//! the worker recomputes the reading summary and publishes it to the
//! [`ProgressFeed`].

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::stats::{local_today, ProgressFeed, StatisticsAggregator};
use crate::storage::{date_key, PersistenceGateway, ReadingPosition};

const FAILURE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("persistence worker has shut down")]
    Closed,
}

/// A write that failed, for user-facing notices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteOp {
    SavePosition(ReadingPosition),
    UpsertDaily {
        date: NaiveDate,
        pages_delta: u64,
        seconds_delta: u64,
    },
}

impl WriteOp {
    fn apply(&self, gateway: &dyn PersistenceGateway) -> Result<()> {
        match self {
            WriteOp::SavePosition(p) => {
                gateway.upsert_position(p.surah, p.ayah, p.page, p.scroll_offset, p.saved_at)
            }
            WriteOp::UpsertDaily {
                date,
                pages_delta,
                seconds_delta,
            } => gateway.upsert_daily(*date, *pages_delta, *seconds_delta),
        }
    }

    fn describe(&self) -> String {
        match self {
            WriteOp::SavePosition(p) => format!("save position (page {})", p.page),
            WriteOp::UpsertDaily { date, .. } => format!("update statistics for {}", date_key(*date)),
        }
    }
}

enum PersistJob {
    Write(WriteOp),
    Reset(oneshot::Sender<Result<()>>),
    Flush(oneshot::Sender<()>),
}

/// Cheap, cloneable handle for enqueueing writes
#[derive(Clone)]
pub struct PersistenceHandle {
    jobs: mpsc::UnboundedSender<PersistJob>,
    failures: broadcast::Sender<PersistFailure>,
}

impl PersistenceHandle {
    /// Queue an overwrite of the last-read position
    pub fn save_position(&self, position: ReadingPosition) {
        self.enqueue(PersistJob::Write(WriteOp::SavePosition(position)));
    }

    /// Queue a daily counter increment; zero deltas are dropped here
    pub fn upsert_daily(&self, date: NaiveDate, pages_delta: u64, seconds_delta: u64) {
        if pages_delta == 0 && seconds_delta == 0 {
            return;
        }
        self.enqueue(PersistJob::Write(WriteOp::UpsertDaily {
            date,
            pages_delta,
            seconds_delta,
        }));
    }

    /// Wait until everything queued before this call has been applied
    pub async fn flush(&self) -> Result<(), WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(PersistJob::Flush(tx))
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::Closed)
    }

    /// Delete all statistics and the saved position, after pending writes
    pub async fn reset_all(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(PersistJob::Reset(tx))
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::Closed)?
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistFailure> {
        self.failures.subscribe()
    }

    fn enqueue(&self, job: PersistJob) {
        if self.jobs.send(job).is_err() {
            warn!("Persistence worker closed, dropping write");
        }
    }
}

pub struct PersistenceWorker {
    jobs: mpsc::UnboundedReceiver<PersistJob>,
    stats: StatisticsAggregator,
    feed: ProgressFeed,
    failures: broadcast::Sender<PersistFailure>,
}

impl PersistenceWorker {
    /// Spawn the worker on the current runtime
    ///
    /// The task ends once every handle has been dropped and the queue drained.
    pub fn spawn(
        stats: StatisticsAggregator,
        feed: ProgressFeed,
    ) -> (PersistenceHandle, JoinHandle<()>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let worker = Self {
            jobs: jobs_rx,
            stats,
            feed,
            failures: failures.clone(),
        };
        let handle = PersistenceHandle {
            jobs: jobs_tx,
            failures,
        };
        (handle, tokio::spawn(worker.run()))
    }

    async fn run(mut self) {
        let mut dirty = false;

        while let Some(job) = self.jobs.recv().await {
            match job {
                PersistJob::Write(op) => dirty |= self.apply(op).await,
                PersistJob::Reset(done) => {
                    let stats = self.stats.clone();
                    let result = match tokio::task::spawn_blocking(move || stats.reset_all()).await
                    {
                        Ok(result) => result,
                        Err(e) => Err(anyhow::anyhow!("reset task failed: {}", e)),
                    };
                    if let Err(e) = &result {
                        self.report_failure("reset reading data", e);
                    }
                    dirty = true;
                    let _ = done.send(result);
                }
                PersistJob::Flush(done) => {
                    if dirty {
                        self.publish_summary().await;
                        dirty = false;
                    }
                    let _ = done.send(());
                    continue;
                }
            }

            if dirty && self.jobs.is_empty() {
                self.publish_summary().await;
                dirty = false;
            }
        }

        debug!("Persistence worker stopped");
    }

    /// Apply one write; returns whether storage changed
    async fn apply(&self, op: WriteOp) -> bool {
        let gateway = Arc::clone(self.stats.gateway());
        let label = op.describe();

        match tokio::task::spawn_blocking(move || op.apply(gateway.as_ref())).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.report_failure(&label, &e);
                false
            }
            Err(e) => {
                error!(job = %label, error = %e, "Persistence task panicked");
                false
            }
        }
    }

    fn report_failure(&self, label: &str, err: &anyhow::Error) {
        let detail = format!("{:#}", err);
        warn!(job = %label, error = %detail, "Persistence write failed");
        // No subscribers is fine; the failure is already logged
        let _ = self.failures.send(PersistFailure {
            message: format!("Could not {}: {}", label, detail),
        });
    }

    async fn publish_summary(&self) {
        let stats = self.stats.clone();
        match tokio::task::spawn_blocking(move || stats.summary_on(local_today())).await {
            Ok(Ok(summary)) => self.feed.publish(summary),
            Ok(Err(e)) => {
                let detail = format!("{:#}", e);
                warn!(error = %detail, "Failed to refresh reading summary");
            }
            Err(e) => error!(error = %e, "Summary task panicked"),
        }
    }
}
