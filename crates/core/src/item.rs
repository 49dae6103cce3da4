//! Work items: one desired `(x, y, color)` mutation each.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Index into the remote palette.
pub type ColorIndex = u8;

/// Number of colors in the remote palette; valid indices are `0..PALETTE_SIZE`.
pub const PALETTE_SIZE: ColorIndex = 16;

/// Constant added to `x + y` to form the request checksum.
const CHECKSUM_BIAS: i64 = 8;

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// A single "paint this cell with this color" request.
///
/// Items are immutable once created. A queue may hold several items for
/// the same coordinate, or items that are already satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub x: i32,
    pub y: i32,
    pub color: ColorIndex,
}

impl WorkItem {
    pub const fn new(x: i32, y: i32, color: ColorIndex) -> Self {
        Self { x, y, color }
    }

    /// Return a copy of this item moved by `offset`.
    pub fn translate(self, offset: Offset) -> Self {
        Self {
            x: self.x.wrapping_add(offset.x),
            y: self.y.wrapping_add(offset.y),
            color: self.color,
        }
    }

    /// Checksum the remote API expects alongside the coordinates.
    pub fn checksum(&self) -> i64 {
        i64::from(self.x) + i64::from(self.y) + CHECKSUM_BIAS
    }

    /// Reject colors outside the palette.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.color >= PALETTE_SIZE {
            return Err(CoreError::Validation(format!(
                "Color {} at ({}, {}) is outside the {PALETTE_SIZE}-color palette",
                self.color, self.x, self.y
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Offset
// ---------------------------------------------------------------------------

/// Translation applied to a whole batch before it is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Translate every item by `offset`, preserving order.
pub fn translate_all(items: &[WorkItem], offset: Offset) -> Vec<WorkItem> {
    items.iter().map(|item| item.translate(offset)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
