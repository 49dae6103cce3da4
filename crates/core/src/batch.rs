//! Batch files: the caller-supplied set of work items for one run.
//!
//! A batch is read from JSON in one of two shapes:
//!
//! ```json
//! [{"x": 0, "y": 0, "color": 5}, {"x": 1, "y": 0, "color": 5}]
//! ```
//!
//! or a document with an offset, explicit items and rectangle shapes:
//!
//! ```json
//! {
//!   "offset": {"x": 100, "y": -40},
//!   "items": [{"x": 0, "y": 0, "color": 5}],
//!   "shapes": [
//!     {"kind": "fill", "x": 0, "y": 0, "width": 8, "height": 4, "color": 3},
//!     {"kind": "stroke", "from": {"x": 0, "y": 0}, "to": {"x": 9, "y": 9}, "color": 0}
//!   ]
//! }
//! ```

use serde::Deserialize;

use crate::error::CoreError;
use crate::item::{translate_all, ColorIndex, Offset, WorkItem};

/// Upper bound on the number of cells a single shape may expand to.
pub const MAX_SHAPE_CELLS: u64 = 1 << 22;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Corner of a rectangle outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A rectangle that expands into work items.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Solid `width` x `height` rectangle whose top-left cell is `(x, y)`.
    Fill {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: ColorIndex,
    },
    /// One-cell outline of the rectangle spanned by two opposite corners.
    Stroke {
        from: Point,
        to: Point,
        color: ColorIndex,
    },
}

impl Shape {
    /// Expand the shape into work items.
    pub fn expand(&self) -> Result<Vec<WorkItem>, CoreError> {
        match *self {
            Shape::Fill {
                x,
                y,
                width,
                height,
                color,
            } => fill_rectangle(x, y, width, height, color),
            Shape::Stroke { from, to, color } => stroke_rectangle(from, to, color),
        }
    }
}

/// Every cell of a `width` x `height` rectangle, row by row.
pub fn fill_rectangle(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: ColorIndex,
) -> Result<Vec<WorkItem>, CoreError> {
    let cells = u64::from(width) * u64::from(height);
    if cells > MAX_SHAPE_CELLS {
        return Err(CoreError::Validation(format!(
            "Rectangle {width}x{height} exceeds {MAX_SHAPE_CELLS} cells"
        )));
    }

    let mut items = Vec::with_capacity(cells as usize);
    for dy in 0..height {
        for dx in 0..width {
            items.push(WorkItem::new(
                x.wrapping_add(dx as i32),
                y.wrapping_add(dy as i32),
                color,
            ));
        }
    }
    Ok(items)
}

/// The outline of the rectangle spanned by `from` and `to` (inclusive).
///
/// Each border cell appears exactly once; degenerate rectangles (a single
/// row or column) produce a line.
pub fn stroke_rectangle(
    from: Point,
    to: Point,
    color: ColorIndex,
) -> Result<Vec<WorkItem>, CoreError> {
    let (x0, x1) = (from.x.min(to.x), from.x.max(to.x));
    let (y0, y1) = (from.y.min(to.y), from.y.max(to.y));

    let width = (i64::from(x1) - i64::from(x0) + 1) as u64;
    let height = (i64::from(y1) - i64::from(y0) + 1) as u64;
    let cells = if width == 1 || height == 1 {
        width * height
    } else {
        2 * (width + height) - 4
    };
    if cells > MAX_SHAPE_CELLS {
        return Err(CoreError::Validation(format!(
            "Outline {width}x{height} exceeds {MAX_SHAPE_CELLS} cells"
        )));
    }

    let mut items = Vec::with_capacity(cells as usize);
    for x in x0..=x1 {
        items.push(WorkItem::new(x, y0, color));
    }
    if y1 > y0 {
        for x in x0..=x1 {
            items.push(WorkItem::new(x, y1, color));
        }
    }
    for y in y0.saturating_add(1)..y1 {
        items.push(WorkItem::new(x0, y, color));
        if x1 > x0 {
            items.push(WorkItem::new(x1, y, color));
        }
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatch {
    Items(Vec<WorkItem>),
    Document(BatchDocument),
}

#[derive(Deserialize)]
struct BatchDocument {
    #[serde(default)]
    offset: Offset,
    #[serde(default)]
    items: Vec<WorkItem>,
    #[serde(default)]
    shapes: Vec<Shape>,
}

/// The caller-supplied work for a run: items plus the offset every pass
/// applies to them before dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub items: Vec<WorkItem>,
    pub offset: Offset,
}

impl Batch {
    pub fn new(items: Vec<WorkItem>, offset: Offset) -> Self {
        Self { items, offset }
    }

    /// Parse and validate a batch file.
    ///
    /// Shapes are expanded after the explicit items, in file order. Every
    /// resulting color must be a palette index.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let batch = match serde_json::from_str::<RawBatch>(json)? {
            RawBatch::Items(items) => Self::new(items, Offset::default()),
            RawBatch::Document(doc) => {
                let mut items = doc.items;
                for shape in &doc.shapes {
                    items.extend(shape.expand()?);
                }
                Self::new(items, doc.offset)
            }
        };

        for item in &batch.items {
            item.validate()?;
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items moved by the batch offset, as a pass dispatches them.
    pub fn translated(&self) -> Vec<WorkItem> {
        translate_all(&self.items, self.offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
