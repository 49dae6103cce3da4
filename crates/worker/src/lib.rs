//! `pixelfleet-worker` library crate: the work distribution engine.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod control;
pub mod convergence;
pub mod engine;
pub mod queue;
pub mod worker;
