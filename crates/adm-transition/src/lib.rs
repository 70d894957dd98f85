//! Delayed `pending -> processing` transitioner.
//!
//! Two redundant paths move an order out of `pending`:
//! - the periodic [`Transitioner::sweep`], which catches everything old
//!   enough, including orders whose one-shot was lost to a restart;
//! - the one-shot scheduled by [`Transitioner::on_order_created`], which
//!   fires once per order after the configured delay.
//!
//! Every write is guarded on `status == pending`, so whichever path lands
//! second is a no-op and history gets exactly one system entry.

mod memory;
mod pg;
mod scheduler;
mod store;

pub use memory::MemoryOrderStore;
pub use pg::PgOrderStore;
pub use scheduler::OneShotScheduler;
pub use store::{OrderStore, StatusUpdate};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use adm_config::TransitionerConfig;
use adm_schemas::OrderRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Pending orders returned by the query.
    pub scanned: usize,
    /// Orders old enough to transition.
    pub due: usize,
    /// Orders the batch actually moved.
    pub transitioned: usize,
    /// Orders skipped because `createdAt` could not be read.
    pub unreadable: usize,
}

/// Outcome of the last sweep, for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub finished_at: DateTime<Utc>,
    pub report: Option<SweepReport>,
    pub error: Option<String>,
}

/// What a one-shot check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Transitioned,
    /// The order had already left `pending`.
    NotPending,
    Missing,
    /// Store error; already logged.
    Failed,
}

/// True when `created_at` is at least `after_ms` before `now`.
pub fn is_due(created_at: DateTime<Utc>, now: DateTime<Utc>, after_ms: i64) -> bool {
    now.signed_duration_since(created_at).num_milliseconds() >= after_ms
}

pub struct Transitioner {
    store: Arc<dyn OrderStore>,
    config: TransitionerConfig,
    scheduler: OneShotScheduler,
    last_sweep: Mutex<Option<SweepSummary>>,
}

impl Transitioner {
    pub fn new(store: Arc<dyn OrderStore>, config: TransitionerConfig) -> Self {
        Self {
            store,
            config,
            scheduler: OneShotScheduler::new(),
            last_sweep: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub fn config(&self) -> &TransitionerConfig {
        &self.config
    }

    /// One-shot checks still waiting to fire.
    pub fn scheduled_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn is_scheduled(&self, order_id: &str) -> bool {
        self.scheduler.is_scheduled(order_id)
    }

    pub fn last_sweep(&self) -> Option<SweepSummary> {
        self.last_sweep
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Abort every scheduled one-shot.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep with an explicit client clock. Errors are logged and returned.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let res = self.run_sweep(now).await;
        if let Err(e) = &res {
            error!(error = %format!("{e:#}"), store = self.store.backend_name(), "sweep failed");
        }

        let summary = SweepSummary {
            finished_at: Utc::now(),
            report: res.as_ref().ok().cloned(),
            error: res.as_ref().err().map(|e| format!("{e:#}")),
        };
        *self
            .last_sweep
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(summary);

        res
    }

    async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let pending = self
            .store
            .query_pending()
            .await
            .context("query pending orders failed")?;

        let mut report = SweepReport {
            scanned: pending.len(),
            ..SweepReport::default()
        };

        let mut updates = Vec::new();
        for order in &pending {
            match order.created_at.normalize() {
                Ok(created) => {
                    if is_due(created, now, self.config.transition_after_ms) {
                        updates.push(StatusUpdate::processing(&order.id, now, &self.config.sweep_note));
                    }
                }
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "skipping order with unreadable createdAt");
                    report.unreadable += 1;
                }
            }
        }
        report.due = updates.len();

        if updates.is_empty() {
            debug!(scanned = report.scanned, "no pending orders due");
            return Ok(report);
        }

        report.transitioned = self
            .store
            .commit_batch(&updates)
            .await
            .context("commit transition batch failed")?;

        for u in &updates {
            self.scheduler.cancel(&u.order_id);
        }

        info!(
            scanned = report.scanned,
            due = report.due,
            transitioned = report.transitioned,
            "sweep committed"
        );
        Ok(report)
    }

    /// Record-created trigger: schedule a single check after the one-shot
    /// delay. A snapshot that is already past `pending` schedules nothing.
    pub fn on_order_created(self: &Arc<Self>, order_id: &str, snapshot: Option<&OrderRecord>) {
        if let Some(order) = snapshot {
            if !order.status.is_pending() {
                debug!(order_id, status = %order.status, "created order not pending; no check scheduled");
                return;
            }
        }

        let weak = Arc::downgrade(self);
        let id = order_id.to_string();
        let delay = Duration::from_millis(self.config.one_shot_delay_ms);
        self.scheduler.schedule(order_id, delay, async move {
            if let Some(this) = weak.upgrade() {
                this.check_one(&id).await;
            }
        });
        debug!(order_id, delay_ms = self.config.one_shot_delay_ms, "one-shot check scheduled");
    }

    /// Re-read one order and move it if it is still pending. Never fails;
    /// store errors are logged.
    pub async fn check_one(&self, order_id: &str) -> CheckOutcome {
        let order = match self.store.get(order_id).await {
            Ok(Some(o)) => o,
            Ok(None) => {
                debug!(order_id, "one-shot: order no longer exists");
                return CheckOutcome::Missing;
            }
            Err(e) => {
                error!(order_id, error = %format!("{e:#}"), "one-shot: read failed");
                return CheckOutcome::Failed;
            }
        };

        if !order.status.is_pending() {
            debug!(order_id, status = %order.status, "one-shot: already moved");
            return CheckOutcome::NotPending;
        }

        let update =
            StatusUpdate::processing(order_id, Utc::now(), &self.config.created_trigger_note);
        match self.store.update_one(&update).await {
            Ok(true) => {
                info!(order_id, "one-shot: order moved to processing");
                CheckOutcome::Transitioned
            }
            Ok(false) => CheckOutcome::NotPending,
            Err(e) => {
                error!(order_id, error = %format!("{e:#}"), "one-shot: update failed");
                CheckOutcome::Failed
            }
        }
    }
}

/// Run [`Transitioner::sweep`] every `interval`, first tick immediately.
/// A failed sweep is handed to `on_result` and the next tick tries again.
pub fn spawn_sweep_loop<F>(
    transitioner: Arc<Transitioner>,
    interval: Duration,
    mut on_result: F,
) -> JoinHandle<()>
where
    F: FnMut(&Result<SweepReport>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let res = transitioner.sweep().await;
            on_result(&res);
        }
    })
}
