//! Selection algorithms.  Each one mutates a [`MaskBuffer`](crate::canvas::MaskBuffer)
//! directly; callers route the mutation through the mask editor so the GPU copy
//! follows.

pub mod brush;
pub mod ingest;
pub mod polygon;
pub mod quick_select;

pub use brush::{BrushMode, BrushSettings};
pub use ingest::IngestMode;
pub use polygon::{PolygonLoop, PolygonMode};
pub use quick_select::{QuickSelectOptions, SelectMode, SelectionRegion};
