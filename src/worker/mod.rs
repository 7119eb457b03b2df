//! Polling worker and its supervisor
//!
//! The worker runs one cycle per interval: fetch → persist → settle →
//! forecast → compose → broadcast → sleep. The supervisor owns at most one
//! running worker task and is the only way to start or stop it, which is
//! what keeps the single-instance rule enforceable from the command
//! surface.

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::forecast;
use crate::message;
use crate::notify::{self, DeliveryChannel};
use crate::reconcile;
use crate::source::DrawSource;
use crate::storage::Database;
use crate::types::Forecast;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// What a single cycle accomplished, which decides the next sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Full cycle ran and the status message was broadcast.
    Posted,
    /// Fetch failed or returned nothing; no state advanced.
    NoData,
}

/// Owns the lifecycle of at most one background task.
///
/// `start` refuses while a task is live, `stop` cancels cooperatively and
/// waits for the in-flight iteration to unwind.
pub struct Supervisor {
    running: Mutex<Option<RunningTask>>,
}

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(None),
        }
    }

    /// Spawn the task produced by `spawn`, handing it a shutdown receiver.
    /// Fails with `AlreadyRunning` when a previous task is still live.
    pub async fn start<F, Fut>(&self, spawn: F) -> Result<()>
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.running.lock().await;
        if let Some(task) = guard.as_ref() {
            if !task.handle.is_finished() {
                return Err(BotError::AlreadyRunning);
            }
        }

        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(spawn(receiver));
        *guard = Some(RunningTask { shutdown, handle });
        Ok(())
    }

    /// Signal shutdown and wait for the task to finish its current
    /// iteration. Fails with `NotRunning` when nothing was started.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.running.lock().await;
        let Some(task) = guard.take() else {
            return Err(BotError::NotRunning);
        };

        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                tracing::error!("worker task panicked: {e}");
            }
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        matches!(
            self.running.lock().await.as_ref(),
            Some(task) if !task.handle.is_finished()
        )
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// The polling-and-broadcast loop.
pub struct PollWorker<S, C> {
    db: Database,
    source: S,
    channel: Arc<C>,
    config: Config,
}

impl<S, C> PollWorker<S, C>
where
    S: DrawSource,
    C: DeliveryChannel,
{
    pub fn new(db: Database, source: S, channel: Arc<C>, config: Config) -> Self {
        Self {
            db,
            source,
            channel,
            config,
        }
    }

    /// Run cycles until shutdown is signalled. Cancellation is cooperative:
    /// it is observed at the sleep between cycles, so a cycle that has
    /// started always commits or fails as a whole.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval = self.config.worker.post_interval_secs,
            "polling worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(CycleOutcome::Posted) => {
                    Duration::from_secs(self.config.worker.post_interval_secs)
                }
                Ok(CycleOutcome::NoData) => {
                    Duration::from_secs(self.config.worker.retry_backoff_secs)
                }
                Err(e) => {
                    // Committing failed mid-cycle; retry on the next tick.
                    tracing::error!("cycle failed: {e}");
                    Duration::from_secs(self.config.worker.post_interval_secs)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("polling worker stopped");
    }

    /// One fetch → persist → settle → forecast → broadcast pass.
    pub(crate) async fn run_cycle(&self) -> Result<CycleOutcome> {
        let worker_cfg = &self.config.worker;

        // 1. Fetch. Failures and empty batches are transient: back off and
        //    retry without touching the stores.
        let fetched = match self.source.fetch(self.config.source.page_size).await {
            Ok(batch) if batch.is_empty() => {
                tracing::warn!("draw feed returned no rounds");
                return Ok(CycleOutcome::NoData);
            }
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("draw fetch failed: {e}");
                return Ok(CycleOutcome::NoData);
            }
        };

        // 2. Persist and prune. A failure here aborts the cycle before any
        //    forecast is issued for unobserved data.
        let inserted = self
            .db
            .insert_rounds(&fetched, worker_cfg.retention)
            .await?;
        if inserted > 0 {
            tracing::debug!(inserted, "new rounds observed");
        }

        // 3. Settle open forecasts against what just arrived.
        reconcile::resolve_results(&self.db, &fetched, worker_cfg.high_threshold).await?;

        // 4. Forecast the next round. Issuance is idempotent: an id that
        //    already has a forecast (restart, repeated cycle) is left alone.
        let history = self
            .db
            .list_recent_rounds(worker_cfg.history_window as i64)
            .await?;
        let draft = forecast::forecast_next(&history, worker_cfg);
        let previous = self.db.latest_forecast().await?;
        let multiplier = forecast::next_multiplier(previous.as_ref(), worker_cfg.multiplier_cap);

        if self.db.get_forecast(&draft.issue).await?.is_none() {
            let next = Forecast {
                issue: draft.issue.clone(),
                predicted: draft.predicted,
                confidence: draft.confidence,
                multiplier,
                created_at: Utc::now(),
                result: None,
            };
            self.db.issue_forecast(&next, worker_cfg.retention).await?;
            tracing::info!(
                issue = %next.issue,
                predicted = %next.predicted,
                confidence = next.confidence,
                multiplier,
                "forecast issued"
            );
        }

        // 5. Compose and fan out.
        let rounds = self
            .db
            .list_recent_rounds(worker_cfg.display_count)
            .await?;
        let mut annotated = Vec::with_capacity(rounds.len());
        for round in rounds {
            let forecast = self.db.get_forecast(&round.issue).await?;
            annotated.push((round, forecast));
        }
        let latest = self.db.latest_forecast().await?;

        let text = message::build_status_message(
            &worker_cfg.header_title,
            &annotated,
            latest.as_ref(),
            worker_cfg.high_threshold,
        );

        let destinations = self.db.list_destinations().await?;
        let (delivered, failed) = notify::broadcast(self.channel.as_ref(), &destinations, &text).await;
        tracing::info!(delivered, failed, "status broadcast");

        Ok(CycleOutcome::Posted)
    }
}
