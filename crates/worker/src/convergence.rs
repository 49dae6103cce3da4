//! Multi-pass convergence loop.
//!
//! Passes repeat with a fresh base identity until one of them converges
//! or the pass budget runs out. Running out is reported, never raised.

use pixelfleet_core::batch::Batch;
use pixelfleet_core::identity::random_base;
use tracing::Instrument;

use crate::engine::{Engine, PassReport};

/// Result of a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes actually executed.
    pub passes: u32,
    pub converged: bool,
    /// Accepted submissions across all passes.
    pub accepted: usize,
    pub last_pass: Option<PassReport>,
}

impl Engine {
    /// Drive `batch` to convergence, running at most `max_passes` passes.
    pub async fn run(&self, batch: &Batch) -> RunSummary {
        let mut summary = RunSummary::default();

        for pass in 1..=self.settings.max_passes {
            if let Some(refresher) = &self.refresher {
                if let Err(e) = refresher.refresh(&batch.translated()).await {
                    tracing::warn!(pass, error = %e, "Canvas refresh failed, using stale snapshot");
                }
            }

            let base = random_base(&mut rand::rng(), &self.settings.fingerprint_tail);
            let report = self
                .run_pass(&base, batch)
                .instrument(tracing::info_span!("pass", pass))
                .await;

            summary.passes = pass;
            summary.accepted += report.accepted;
            summary.last_pass = Some(report);

            if report.is_converged() {
                summary.converged = true;
                tracing::info!(pass, total_accepted = summary.accepted, "Batch converged");
                return summary;
            }

            tracing::info!(
                pass,
                accepted = report.accepted,
                deferred = report.deferred,
                "Pass did not converge",
            );
        }

        tracing::error!(
            passes = summary.passes,
            total_accepted = summary.accepted,
            "Batch did not converge within the pass budget",
        );
        summary
    }
}
