//! Keeps a [`SharedCanvas`] in sync with the remote canvas.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pixelfleet_core::canvas::{chunks_covering, SharedCanvas};
use pixelfleet_core::item::WorkItem;

use crate::api::PixelApi;
use crate::error::RemoteError;

/// Maximum number of chunk downloads in flight at once.
const MAX_CONCURRENT_FETCHES: usize = 8;

/// Reloads the parts of the local snapshot a batch depends on.
#[async_trait]
pub trait CanvasRefresher: Send + Sync {
    /// Refresh every chunk covering `items`; returns the number of chunks
    /// reloaded.
    async fn refresh(&self, items: &[WorkItem]) -> Result<usize, RemoteError>;
}

/// Downloads chunks over HTTP into a [`SharedCanvas`].
pub struct ChunkLoader {
    api: PixelApi,
    canvas: SharedCanvas,
}

impl ChunkLoader {
    pub fn new(api: PixelApi, canvas: SharedCanvas) -> Self {
        Self { api, canvas }
    }
}

#[async_trait]
impl CanvasRefresher for ChunkLoader {
    async fn refresh(&self, items: &[WorkItem]) -> Result<usize, RemoteError> {
        let coords = chunks_covering(items);
        tracing::debug!(chunks = coords.len(), "Refreshing canvas chunks");

        let api = &self.api;
        let mut fetches = stream::iter(coords)
            .map(|coord| async move { (coord, api.fetch_chunk(coord).await) })
            .buffer_unordered(MAX_CONCURRENT_FETCHES);

        let mut loaded = 0;
        while let Some((coord, result)) = fetches.next().await {
            let chunk = result?;
            self.canvas
                .update(|snapshot| snapshot.replace_chunk(coord, chunk));
            loaded += 1;
        }

        tracing::info!(chunks = loaded, "Canvas snapshot refreshed");
        Ok(loaded)
    }
}
