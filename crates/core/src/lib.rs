//! Domain types and pure logic for the pixelfleet dispatcher.
//!
//! Nothing in this crate performs I/O: it defines work items and batch
//! files, the chunked canvas snapshot used for idempotency checks,
//! worker identity derivation, and the classification of remote
//! responses into [`outcome::SubmissionOutcome`]s.

pub mod batch;
pub mod canvas;
pub mod error;
pub mod identity;
pub mod item;
pub mod outcome;
