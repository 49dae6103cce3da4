//! REST client for the remote mutation API.
//!
//! Wraps the two endpoints the engine needs (cell mutation and chunk
//! download) using [`reqwest`]. Mutation responses are never surfaced as
//! errors; they are classified into a [`SubmissionOutcome`] instead.

use async_trait::async_trait;
use pixelfleet_core::canvas::{Chunk, ChunkCoord};
use pixelfleet_core::identity::WorkerIdentity;
use pixelfleet_core::item::{ColorIndex, WorkItem};
use pixelfleet_core::outcome::{classify, classify_status, SubmissionOutcome};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::RemoteError;
use crate::token::Token;

/// Path of the cell mutation endpoint.
pub const SUBMIT_PATH: &str = "/api/pixel";

/// Path prefix of the chunk download endpoint (`{CHUNK_PATH}/{cx}/{cy}`).
pub const CHUNK_PATH: &str = "/api/chunk";

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

/// Performs one remote mutation attempt.
///
/// Implementations classify every server response into a
/// [`SubmissionOutcome`]. An `Err` means the attempt could not be made at
/// all (for example an invalid item); the worker logs it and carries on.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(
        &self,
        item: &WorkItem,
        identity: &WorkerIdentity,
        token: &Token,
    ) -> Result<SubmissionOutcome, RemoteError>;
}

/// JSON body of a mutation request. Field names are fixed by the remote.
#[derive(Debug, Serialize)]
struct PixelRequest<'a> {
    x: i32,
    y: i32,
    /// Checksum, `x + y + 8`.
    a: i64,
    fingerprint: &'a str,
    color: ColorIndex,
    token: &'a str,
}

// ---------------------------------------------------------------------------
// PixelApi
// ---------------------------------------------------------------------------

/// HTTP client for one deployment of the mutation API.
#[derive(Debug, Clone)]
pub struct PixelApi {
    client: reqwest::Client,
    api_url: String,
}

impl PixelApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://host`. A trailing slash
    ///   is ignored.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Download one chunk of the canvas.
    ///
    /// Returns `Ok(None)` when the remote has never allocated the chunk
    /// (`404`), meaning every cell holds the default color.
    pub async fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Option<Chunk>, RemoteError> {
        let response = self
            .client
            .get(format!(
                "{}{CHUNK_PATH}/{}/{}",
                self.api_url, coord.cx, coord.cy
            ))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(Some(Chunk::from_bytes(&bytes)?))
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`RemoteError::ApiError`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Submitter for PixelApi {
    /// Send `POST /api/pixel` and classify the response.
    ///
    /// Network failures and unreadable bodies count as a transient error;
    /// only an invalid item or an unbuildable request is returned as `Err`.
    async fn submit(
        &self,
        item: &WorkItem,
        identity: &WorkerIdentity,
        token: &Token,
    ) -> Result<SubmissionOutcome, RemoteError> {
        item.validate()?;

        let body = PixelRequest {
            x: item.x,
            y: item.y,
            a: item.checksum(),
            fingerprint: &identity.derived_id,
            color: item.color,
            token: token.as_str(),
        };

        let response = match self
            .client
            .post(format!("{}{SUBMIT_PATH}", self.api_url))
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_builder() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    worker = identity.index,
                    error = %e,
                    "Submission transport failure",
                );
                return Ok(SubmissionOutcome::transient());
            }
        };

        let status = response.status().as_u16();
        if let Some(outcome) = classify_status(status) {
            return Ok(outcome);
        }

        match response.bytes().await {
            Ok(body) => Ok(classify(status, &body)),
            Err(e) => {
                tracing::warn!(
                    worker = identity.index,
                    status,
                    error = %e,
                    "Failed to read submission response",
                );
                Ok(SubmissionOutcome::transient())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
