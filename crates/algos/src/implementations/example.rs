use image::{DynamicImage, GenericImage, GenericImageView, Luma, Rgba};
use mask::{GeometryExtractor, LabelMask};

use crate::{
    error::{AlgorithmError, Result},
    output::AlgoOutput,
    params::ParameterMap,
    traits::Algorithm,
};

const HW_RATIO: u32 = 12;
const CLASSIFICATIONS: [&str; 3] = ["Positive", "Positive", "Negative"];
const METRICS: [f64; 3] = [10.0, 20.42, 30.5];

/// Demonstration algorithm: draws a fixed three-object mask scaled to the
/// input, keeps the input pixels under it and reports enriched features.
#[derive(Debug, Clone, Default)]
pub struct ExampleAlgorithm;

impl Algorithm for ExampleAlgorithm {
    fn invoke(&self, pixels: &DynamicImage, params: &ParameterMap) -> Result<AlgoOutput> {
        tracing::debug!(?params, "example parameters");

        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(AlgorithmError::UnsupportedInput(
                "expecting a non-empty 2D image (single channel or RGB)".to_string(),
            ));
        }

        let mask = draw_mask(width, height);

        let mut image = pixels.clone();
        for (x, y, label) in mask.enumerate_pixels() {
            if label[0] == 0 {
                image.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }

        let features = GeometryExtractor::default()
            .extract(&mask)?
            .into_iter()
            .enumerate()
            .map(|(i, mut feature)| {
                if let (Some(class), Some(metric)) = (CLASSIFICATIONS.get(i), METRICS.get(i)) {
                    feature.properties.classification = Some(class.to_string());
                    feature =
                        feature.with_measurement("Metric from Python", serde_json::json!(metric));
                }
                feature
            })
            .collect();

        Ok(AlgoOutput::default().with_image(image).with_features(features))
    }
}

/// Two rectangles (labels 1 and 2) centred on the upper quarter line and a
/// trapezoid (label 3) hanging below the centre line.
pub fn draw_mask(width: u32, height: u32) -> LabelMask {
    let (n, m) = (height, width);
    let mut mask = LabelMask::new(width, height);

    let rows = (n / 4 - n / HW_RATIO)..(n / 4 + n / HW_RATIO);
    let left = (m / 4 - m / HW_RATIO)..(m / 4 + m / HW_RATIO);
    let right = (3 * m / 4 - m / HW_RATIO)..(3 * m / 4 + m / HW_RATIO);
    for y in rows {
        for x in left.clone() {
            mask.put_pixel(x, y, Luma([1]));
        }
        for x in right.clone() {
            mask.put_pixel(x, y, Luma([2]));
        }
    }

    let quarter = n / 4;
    for i in 0..quarter {
        let shrink = f64::from(i) * f64::from(m / 4 - m / 8) / f64::from(quarter);
        let half_width = (f64::from(m / 4) - shrink).round_ties_even() as u32;
        for x in (m / 2 - half_width)..(m / 2 + half_width) {
            mask.put_pixel(x, n / 2 + i, Luma([3]));
        }
    }

    mask
}
