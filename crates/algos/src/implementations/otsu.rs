use image::{DynamicImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::{
    error::{AlgorithmError, Result},
    output::AlgoOutput,
    params::ParameterMap,
    traits::Algorithm,
};

/// Global Otsu threshold on luma, then 8-connected labelling of the
/// foreground. Takes no parameters.
#[derive(Debug, Clone, Default)]
pub struct OtsuThreshold;

impl Algorithm for OtsuThreshold {
    fn invoke(&self, pixels: &DynamicImage, _params: &ParameterMap) -> Result<AlgoOutput> {
        let gray = pixels.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(AlgorithmError::UnsupportedInput(
                "expecting a non-empty 2D image".to_string(),
            ));
        }

        let level = imageproc::contrast::otsu_level(&gray);
        let mut binary = gray;
        for p in binary.pixels_mut() {
            *p = if p.0[0] > level { Luma([255]) } else { Luma([0]) };
        }
        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        let objects = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
        tracing::debug!(level, objects, "otsu labelling done");

        Ok(AlgoOutput::default().with_mask(labels))
    }
}
