//! HTTP collaborators of the work distribution engine.
//!
//! Provides the mutation API client ([`api::PixelApi`]) behind the
//! [`api::Submitter`] trait, authorization token acquisition with a
//! per-attempt timeout ([`token::TokenProvider`]), and the chunk loader
//! that keeps the local canvas snapshot in sync ([`chunks::ChunkLoader`]).

pub mod api;
pub mod chunks;
pub mod error;
pub mod token;
