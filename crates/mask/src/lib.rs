//! # Label Mask Geometry Extraction
//!
//! Turns an integer label mask (background `0`, one positive value per detected
//! object) into one closed polygon per object.
//!
//! ## Core Features
//!
//! - **Marching squares**: iso-contours traced at the `0.5` level of a padded
//!   binary indicator grid, so objects touching the image border still close
//! - **Deterministic tie-break**: when a label traces to several disjoint
//!   contours, the one with the most vertices is kept
//! - **Trait-based steps**: swap the tracer or the selector by implementing
//!   [`ContourTracer`] / [`ContourSelector`]
//! - **GeoJSON Support**: export features and feature collections
//!
//! ## Quick Start
//!
//! ```rust
//! use image::Luma;
//! use mask::{GeometryExtractor, LabelMask};
//!
//! let mut labels = LabelMask::new(8, 8);
//! for y in 2..5 {
//!     for x in 2..5 {
//!         labels.put_pixel(x, y, Luma([1]));
//!     }
//! }
//!
//! let features = GeometryExtractor::default().extract(&labels)?;
//! assert_eq!(features.len(), 1);
//! assert_eq!(features[0].label(), 1);
//! # Ok::<(), mask::MaskError>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod io;

// Re-exports for convenience
pub use error::{MaskError, Result};
pub use types::{Contour, DetectionProperties, LabelMask, PolygonFeature};
pub use traits::*;
pub use algorithms::{LabelGeometryExtractor, MarchingSquares, MostVerticesSelector};
pub use io::{features_to_geojson, features_to_geojson_string};

/// The standard extractor: marching squares at level 0.5, longest contour wins
pub type GeometryExtractor = LabelGeometryExtractor<MarchingSquares, MostVerticesSelector>;
