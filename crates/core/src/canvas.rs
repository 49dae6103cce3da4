//! Local view of the authoritative canvas, used to skip work that is
//! already satisfied.
//!
//! The canvas is stored as lazily allocated square chunks of
//! [`CHUNK_SIZE`] cells. A coordinate whose chunk has never been
//! allocated holds [`DEFAULT_COLOR`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::CoreError;
use crate::item::{ColorIndex, WorkItem};

/// Edge length of a chunk, in cells.
pub const CHUNK_SIZE: i32 = 64;

/// Number of cells in one chunk.
pub const CHUNK_CELLS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Color of every cell in an unallocated chunk.
pub const DEFAULT_COLOR: ColorIndex = 0;

// ---------------------------------------------------------------------------
// Coordinate mapping
// ---------------------------------------------------------------------------

/// Floored modulo: the result always lies in `0..m` for positive `m`,
/// including for negative `n` (`floor_mod(-1, 64) == 63`).
pub fn floor_mod(n: i32, m: i32) -> i32 {
    n.rem_euclid(m)
}

/// Floored division, the companion of [`floor_mod`]:
/// `floor_div(n, m) * m + floor_mod(n, m) == n`.
pub fn floor_div(n: i32, m: i32) -> i32 {
    n.div_euclid(m)
}

/// Position of a chunk in the chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkCoord {
    pub const fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }

    /// The chunk that contains the global cell `(x, y)`.
    pub fn containing(x: i32, y: i32) -> Self {
        Self {
            cx: floor_div(x, CHUNK_SIZE),
            cy: floor_div(y, CHUNK_SIZE),
        }
    }
}

/// Chunk-local coordinates of the global cell `(x, y)`, each in `0..CHUNK_SIZE`.
pub fn local_coords(x: i32, y: i32) -> (usize, usize) {
    (
        floor_mod(x, CHUNK_SIZE) as usize,
        floor_mod(y, CHUNK_SIZE) as usize,
    )
}

/// Every chunk touched by `items`, in grid order.
pub fn chunks_covering(items: &[WorkItem]) -> BTreeSet<ChunkCoord> {
    items
        .iter()
        .map(|item| ChunkCoord::containing(item.x, item.y))
        .collect()
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// One allocated chunk: row-major color indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    cells: Vec<ColorIndex>,
}

impl Chunk {
    /// A chunk with every cell set to `color`.
    pub fn filled(color: ColorIndex) -> Self {
        Self {
            cells: vec![color; CHUNK_CELLS],
        }
    }

    /// Build a chunk from a row-major payload of exactly [`CHUNK_CELLS`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != CHUNK_CELLS {
            return Err(CoreError::ChunkSize {
                expected: CHUNK_CELLS,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            cells: bytes.to_vec(),
        })
    }

    pub fn get(&self, local_x: usize, local_y: usize) -> ColorIndex {
        self.cells[local_y * CHUNK_SIZE as usize + local_x]
    }

    pub fn set(&mut self, local_x: usize, local_y: usize, color: ColorIndex) {
        self.cells[local_y * CHUNK_SIZE as usize + local_x] = color;
    }
}

// ---------------------------------------------------------------------------
// CanvasSnapshot
// ---------------------------------------------------------------------------

/// Sparse map of allocated chunks.
#[derive(Debug, Clone, Default)]
pub struct CanvasSnapshot {
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl CanvasSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color currently held by the global cell `(x, y)`.
    pub fn color_at(&self, x: i32, y: i32) -> ColorIndex {
        match self.chunks.get(&ChunkCoord::containing(x, y)) {
            Some(chunk) => {
                let (lx, ly) = local_coords(x, y);
                chunk.get(lx, ly)
            }
            None => DEFAULT_COLOR,
        }
    }

    /// Whether the cell targeted by `item` already has the requested color.
    pub fn is_satisfied(&self, item: &WorkItem) -> bool {
        self.color_at(item.x, item.y) == item.color
    }

    /// Paint a single cell, allocating its chunk on first write.
    pub fn set_color(&mut self, x: i32, y: i32, color: ColorIndex) {
        let (lx, ly) = local_coords(x, y);
        self.chunks
            .entry(ChunkCoord::containing(x, y))
            .or_insert_with(|| Chunk::filled(DEFAULT_COLOR))
            .set(lx, ly, color);
    }

    /// Replace a whole chunk; `None` marks it unallocated again.
    pub fn replace_chunk(&mut self, coord: ChunkCoord, chunk: Option<Chunk>) {
        match chunk {
            Some(chunk) => {
                self.chunks.insert(coord, chunk);
            }
            None => {
                self.chunks.remove(&coord);
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

// ---------------------------------------------------------------------------
// SnapshotReader
// ---------------------------------------------------------------------------

/// Read-only idempotency check consulted by workers before submitting.
///
/// Implementations must not fail for any coordinate.
pub trait SnapshotReader: Send + Sync {
    fn is_satisfied(&self, item: &WorkItem) -> bool;
}

/// Records mutations the remote has confirmed, so later checks see them
/// without waiting for the next refresh.
pub trait SnapshotWriter: Send + Sync {
    fn record_accepted(&self, item: &WorkItem);
}

/// The engine's handle on the local canvas: it checks items before
/// submitting and records every accepted one.
pub trait CanvasView: SnapshotReader + SnapshotWriter {}

impl<T: SnapshotReader + SnapshotWriter + ?Sized> CanvasView for T {}

/// A [`CanvasSnapshot`] shared between the engine, which reads it and
/// records accepted items, and whatever reloads it from the remote canvas.
#[derive(Debug, Clone, Default)]
pub struct SharedCanvas {
    inner: Arc<RwLock<CanvasSnapshot>>,
}

impl SharedCanvas {
    pub fn new(snapshot: CanvasSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Run `f` with exclusive access to the snapshot.
    pub fn update<R>(&self, f: impl FnOnce(&mut CanvasSnapshot) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn color_at(&self, x: i32, y: i32) -> ColorIndex {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .color_at(x, y)
    }
}

impl SnapshotReader for SharedCanvas {
    fn is_satisfied(&self, item: &WorkItem) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_satisfied(item)
    }
}

impl SnapshotWriter for SharedCanvas {
    fn record_accepted(&self, item: &WorkItem) {
        self.update(|snapshot| snapshot.set_color(item.x, item.y, item.color));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
