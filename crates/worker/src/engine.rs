//! The per-pass coordinator.
//!
//! A pass translates the batch, derives one identity per worker, and
//! launches workers one at a time as their initial tokens arrive. Every
//! worker shares the same [`SharedQueue`]; the pass ends when all launched
//! workers have stopped.

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pixelfleet_core::batch::Batch;
use pixelfleet_core::canvas::CanvasView;
use pixelfleet_core::identity::{derive_identities, DEFAULT_FINGERPRINT_TAIL};
use pixelfleet_remote::api::Submitter;
use pixelfleet_remote::chunks::CanvasRefresher;
use pixelfleet_remote::token::TokenProvider;
use tokio::time::Instant;
use tracing::Instrument;

use crate::control::EngineControl;
use crate::queue::SharedQueue;
use crate::worker::{Worker, WorkerContext, WorkerState};

/// Default number of workers per pass.
pub const DEFAULT_PARALLELISM: usize = 128;

/// Default convergence retry budget.
pub const DEFAULT_MAX_PASSES: u32 = 10;

/// Default attempts per held item before it is deferred.
pub const DEFAULT_MAX_ITEM_ATTEMPTS: u32 = 25;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub parallelism: NonZeroUsize,
    pub max_passes: u32,
    /// Fixed tail of the base identity; a random prefix is added per pass.
    pub fingerprint_tail: String,
    /// `None` retries a held item forever.
    pub max_item_attempts: Option<NonZeroU32>,
    pub disabled_poll: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            parallelism: NonZeroUsize::new(DEFAULT_PARALLELISM).unwrap_or(NonZeroUsize::MIN),
            max_passes: DEFAULT_MAX_PASSES,
            fingerprint_tail: DEFAULT_FINGERPRINT_TAIL.to_string(),
            max_item_attempts: NonZeroU32::new(DEFAULT_MAX_ITEM_ATTEMPTS),
            disabled_poll: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// PassReport
// ---------------------------------------------------------------------------

/// Aggregate of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub workers_launched: usize,
    pub accepted: usize,
    pub skipped: usize,
    pub deferred: usize,
    /// Worker tasks that panicked or were cancelled.
    pub failed_workers: usize,
    pub elapsed: Duration,
}

impl PassReport {
    /// A pass converged when it changed nothing and left nothing behind.
    pub fn is_converged(&self) -> bool {
        self.accepted == 0 && self.deferred == 0 && self.failed_workers == 0
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    pub(crate) ctx: WorkerContext,
    pub(crate) settings: EngineSettings,
    pub(crate) refresher: Option<Arc<dyn CanvasRefresher>>,
}

impl Engine {
    pub fn new(
        submitter: Arc<dyn Submitter>,
        snapshot: Arc<dyn CanvasView>,
        tokens: Arc<TokenProvider>,
        control: Arc<EngineControl>,
        settings: EngineSettings,
    ) -> Self {
        let ctx = WorkerContext {
            submitter,
            snapshot,
            tokens,
            control,
            max_item_attempts: settings.max_item_attempts,
            disabled_poll: settings.disabled_poll,
        };
        Self {
            ctx,
            settings,
            refresher: None,
        }
    }

    /// Reload the snapshot through `refresher` before every pass.
    pub fn with_refresher(mut self, refresher: Arc<dyn CanvasRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run every item of `batch` through one pool of workers.
    pub async fn run_pass(&self, base_identity: &str, batch: &Batch) -> PassReport {
        let started = Instant::now();
        let queue = SharedQueue::new(batch.translated());
        let identities = derive_identities(base_identity, self.settings.parallelism);

        tracing::info!(
            items = queue.len(),
            parallelism = self.settings.parallelism.get(),
            "Pass started",
        );

        let mut handles = Vec::with_capacity(identities.len());
        for identity in identities {
            if queue.is_empty() {
                break;
            }

            let probe = queue.clone();
            let Some(token) = self
                .ctx
                .tokens
                .acquire(identity.index, move || probe.is_empty())
                .await
            else {
                break;
            };

            let state = WorkerState {
                identity,
                token: Some(token),
                queue: queue.clone(),
                completed: 0,
            };
            let worker = Worker::new(self.ctx.clone(), state);
            handles.push(tokio::spawn(worker.run().in_current_span()));
        }

        let mut report = PassReport {
            workers_launched: handles.len(),
            ..PassReport::default()
        };

        for result in join_all(handles).await {
            match result {
                Ok(worker) => {
                    report.accepted += worker.accepted;
                    report.skipped += worker.skipped;
                    report.deferred += worker.deferred;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Worker task failed");
                    report.failed_workers += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            workers = report.workers_launched,
            accepted = report.accepted,
            skipped = report.skipped,
            deferred = report.deferred,
            failed_workers = report.failed_workers,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "All works done",
        );
        report
    }
}
