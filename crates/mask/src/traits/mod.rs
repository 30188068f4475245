use image::GrayImage;
use crate::{error::Result, types::Contour};

/// Trait for iso-contour tracing over a binary indicator grid
pub trait ContourTracer: Send + Sync {
    /// Trace every closed contour in `grid` (cells are `0` or `1`), in `[row, column]` order
    fn trace(&self, grid: &GrayImage) -> Result<Vec<Contour>>;
}

/// Trait for picking the primary contour when one label traces to several
pub trait ContourSelector: Send + Sync {
    /// Returns `None` only when `contours` is empty
    fn select(&self, contours: Vec<Contour>) -> Option<Contour>;
}
