pub mod preprocessing;
pub mod extraction;
pub mod selection;

pub use preprocessing::*;
pub use extraction::*;
pub use selection::*;

use crate::{
    error::{MaskError, Result},
    traits::{ContourSelector, ContourTracer},
    types::{LabelMask, PolygonFeature},
};

/// Label-mask to polygon extractor, generic over the tracing and selection steps
#[derive(Debug, Clone, Default)]
pub struct LabelGeometryExtractor<C, S>
where
    C: ContourTracer,
    S: ContourSelector,
{
    pub tracer: C,
    pub selector: S,
}

impl<C, S> LabelGeometryExtractor<C, S>
where
    C: ContourTracer,
    S: ContourSelector,
{
    pub fn new(tracer: C, selector: S) -> Self {
        Self { tracer, selector }
    }

    /// One feature per distinct positive label, in ascending label order.
    ///
    /// Each ring is in `[x, y]` image coordinates and carries `"Detection ID"`.
    /// A label that traces to no closed contour fails the whole extraction
    /// with [`MaskError::NoContour`].
    pub fn extract(&self, mask: &LabelMask) -> Result<Vec<PolygonFeature>> {
        let regions = label_regions(mask);
        let mut features = Vec::with_capacity(regions.len());

        for (label, bounds) in regions {
            let indicator = padded_indicator(mask, label, &bounds);
            let contours = self.tracer.trace(&indicator)?;
            if contours.len() > 1 {
                tracing::debug!(label, count = contours.len(), "label traced to several contours");
            }

            let contour = self
                .selector
                .select(contours)
                .ok_or(MaskError::NoContour { label })?;

            // undo the padding, shift back to mask coordinates, swap to x/y
            let offset_x = f64::from(bounds.min_x) - 1.0;
            let offset_y = f64::from(bounds.min_y) - 1.0;
            let ring = contour
                .into_iter()
                .map(|[row, col]| [col + offset_x, row + offset_y])
                .collect();

            features.push(PolygonFeature::new(label, ring));
        }

        Ok(features)
    }
}
