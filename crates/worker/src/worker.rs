//! One worker of a pass: the pop / check / submit / pace state machine.
//!
//! A worker owns its identity, token and counters. The only state it
//! shares with its siblings is the [`SharedQueue`]. It reads the
//! [`EngineControl`], and it checks the canvas snapshot before every
//! submission and records every accepted item into it.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use pixelfleet_core::canvas::CanvasView;
use pixelfleet_core::identity::WorkerIdentity;
use pixelfleet_core::item::WorkItem;
use pixelfleet_core::outcome::{pacing_delay, SubmissionOutcome, TRANSIENT_WAIT_SECS};
use pixelfleet_remote::api::Submitter;
use pixelfleet_remote::error::RemoteError;
use pixelfleet_remote::token::{Token, TokenProvider};

use crate::control::EngineControl;
use crate::queue::SharedQueue;

// ---------------------------------------------------------------------------
// Shared collaborators
// ---------------------------------------------------------------------------

/// Everything a worker borrows from the engine. Cheap to clone.
#[derive(Clone)]
pub struct WorkerContext {
    pub submitter: Arc<dyn Submitter>,
    pub snapshot: Arc<dyn CanvasView>,
    pub tokens: Arc<TokenProvider>,
    pub control: Arc<EngineControl>,
    /// Attempts allowed per held item before it is deferred to the next
    /// pass. `None` retries forever.
    pub max_item_attempts: Option<NonZeroU32>,
    /// Poll interval while the engine is disabled.
    pub disabled_poll: Duration,
}

/// Per-worker state for one pass. Discarded when the pass ends.
#[derive(Debug)]
pub struct WorkerState {
    pub identity: WorkerIdentity,
    pub token: Option<Token>,
    pub queue: SharedQueue,
    pub completed: usize,
}

/// What a worker did during its pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub index: usize,
    /// Submissions the remote accepted.
    pub accepted: usize,
    /// Items found already satisfied.
    pub skipped: usize,
    /// Items let go without being satisfied; they need another pass.
    pub deferred: usize,
}

#[derive(Debug, Clone, Copy)]
struct HeldItem {
    item: WorkItem,
    attempts: u32,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct Worker {
    ctx: WorkerContext,
    state: WorkerState,
    held: Option<HeldItem>,
    pacing: Duration,
    skipped: usize,
    deferred: usize,
}

impl Worker {
    pub fn new(ctx: WorkerContext, state: WorkerState) -> Self {
        Self {
            ctx,
            state,
            held: None,
            pacing: Duration::ZERO,
            skipped: 0,
            deferred: 0,
        }
    }

    fn index(&self) -> usize {
        self.state.identity.index
    }

    /// Work until the shared queue is empty and nothing is held.
    pub async fn run(mut self) -> WorkerReport {
        self.held = self.state.queue.pop().map(Self::hold);

        tracing::info!(
            worker = self.index(),
            fingerprint = %self.state.identity.derived_id,
            remaining = self.state.queue.len(),
            "Worker started",
        );

        while self.held.is_some() || !self.state.queue.is_empty() {
            if !self.ctx.control.is_enabled() {
                tokio::time::sleep(self.ctx.disabled_poll).await;
                continue;
            }

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            if self.held.is_none() {
                match self.state.queue.pop() {
                    Some(item) => self.held = Some(Self::hold(item)),
                    None => continue,
                }
            }

            if let Err(e) = self.step().await {
                tracing::error!(worker = self.index(), error = %e, "Worker iteration failed");
                self.pacing = pacing_delay(TRANSIENT_WAIT_SECS);
                self.record_failed_attempt();
            }
        }

        tracing::info!(
            worker = self.index(),
            accepted = self.state.completed,
            skipped = self.skipped,
            deferred = self.deferred,
            "Worker stopped",
        );

        WorkerReport {
            index: self.index(),
            accepted: self.state.completed,
            skipped: self.skipped,
            deferred: self.deferred,
        }
    }

    fn hold(item: WorkItem) -> HeldItem {
        HeldItem { item, attempts: 0 }
    }

    /// Handle the held item once.
    async fn step(&mut self) -> Result<(), RemoteError> {
        let Some(held) = self.held else {
            return Ok(());
        };

        if self.ctx.snapshot.is_satisfied(&held.item) {
            tracing::debug!(worker = self.index(), x = held.item.x, y = held.item.y, "Skipping satisfied item");
            self.held = None;
            self.pacing = Duration::ZERO;
            self.skipped += 1;
            return Ok(());
        }

        let token = match self.state.token.clone() {
            Some(token) => token,
            None => match self.reauthorize().await {
                Some(token) => token,
                None => {
                    self.defer("no token");
                    return Ok(());
                }
            },
        };

        let outcome = self
            .ctx
            .submitter
            .submit(&held.item, &self.state.identity, &token)
            .await?;
        self.pacing = outcome.retry_after();

        match outcome {
            SubmissionOutcome::Accepted { .. } => {
                self.ctx.snapshot.record_accepted(&held.item);
                self.state.completed += 1;
                self.held = None;
                tracing::info!(
                    worker = self.index(),
                    x = held.item.x,
                    y = held.item.y,
                    color = held.item.color,
                    remaining = self.state.queue.len(),
                    "Cell painted",
                );
            }
            SubmissionOutcome::AuthExpired { .. } => {
                tracing::warn!(worker = self.index(), "Token expired, re-authorizing");
                self.defer("auth expired");
                self.state.token = None;
                self.reauthorize().await;
            }
            other => {
                tracing::debug!(
                    worker = self.index(),
                    outcome = other.label(),
                    retry_after_secs = other.retry_after_secs(),
                    "Submission not accepted",
                );
                self.record_failed_attempt();
            }
        }

        Ok(())
    }

    /// Fetch a new token, giving up once the shared queue is empty.
    async fn reauthorize(&mut self) -> Option<Token> {
        let queue = self.state.queue.clone();
        let token = self
            .ctx
            .tokens
            .acquire(self.index(), move || queue.is_empty())
            .await;
        self.state.token = token.clone();
        token
    }

    /// Count one failed attempt on the held item and let it go once its
    /// budget is spent.
    fn record_failed_attempt(&mut self) {
        let Some(held) = self.held.as_mut() else {
            return;
        };
        held.attempts += 1;

        if let Some(max) = self.ctx.max_item_attempts {
            if held.attempts >= max.get() {
                self.defer("attempt budget exhausted");
            }
        }
    }

    /// Drop the held item without satisfying it.
    fn defer(&mut self, reason: &'static str) {
        if let Some(held) = self.held.take() {
            self.deferred += 1;
            tracing::warn!(
                worker = self.index(),
                x = held.item.x,
                y = held.item.y,
                attempts = held.attempts,
                reason,
                "Item deferred to next pass",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
