use image::DynamicImage;
use crate::{error::Result, output::AlgoOutput, params::ParameterMap};

/// Uniform capability of an analysis algorithm implementation
pub trait Algorithm: Send + Sync {
    /// Run on `pixels` (single-channel or multi-channel 2-D image) with the
    /// parameters exactly as the client supplied them.
    ///
    /// Returned keys should be a subset of the descriptor's output endpoints.
    fn invoke(&self, pixels: &DynamicImage, params: &ParameterMap) -> Result<AlgoOutput>;
}

impl<F> Algorithm for F
where
    F: Fn(&DynamicImage, &ParameterMap) -> Result<AlgoOutput> + Send + Sync,
{
    fn invoke(&self, pixels: &DynamicImage, params: &ParameterMap) -> Result<AlgoOutput> {
        self(pixels, params)
    }
}
