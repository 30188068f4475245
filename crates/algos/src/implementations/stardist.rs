use std::path::PathBuf;
use std::process::Command;

use image::{DynamicImage, Luma};
use mask::LabelMask;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AlgorithmError, Result},
    output::AlgoOutput,
    params::ParameterMap,
    traits::Algorithm,
};

/// External inference script running the pretrained StarDist models.
///
/// Invoked as `program [args..] script --input <png> --params <json> --output <png>`;
/// the script must write a 16-bit label image to the output path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StardistBackend {
    #[serde(default = "default_program")]
    pub program: String,
    pub script: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "python".to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Stardist {
    backend: Option<StardistBackend>,
}

impl Stardist {
    pub fn new(backend: Option<StardistBackend>) -> Self {
        Self { backend }
    }
}

/// Pretrained model matching the input layout: fluorescence for single
/// channel, H&E brightfield for RGB.
pub fn pretrained_model_for(pixels: &DynamicImage) -> Result<&'static str> {
    match pixels.color().channel_count() {
        1 => Ok("2D_versatile_fluo"),
        3 => Ok("2D_versatile_he"),
        channels => Err(AlgorithmError::UnsupportedInput(format!(
            "unexpected channel count {channels}, expecting single channel or RGB"
        ))),
    }
}

fn positive_int(params: &ParameterMap, name: &str) -> Result<i64> {
    let value = params.get(name).and_then(|v| v.as_i64());
    match value {
        Some(value) if value > 0 => Ok(value),
        _ => Err(AlgorithmError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a positive integer, got {:?}", params.get(name)),
        }),
    }
}

impl Algorithm for Stardist {
    fn invoke(&self, pixels: &DynamicImage, params: &ParameterMap) -> Result<AlgoOutput> {
        let model = pretrained_model_for(pixels)?;
        let block_size = positive_int(params, "block_size")?;
        let min_overlap = positive_int(params, "min_overlap")?;
        if min_overlap >= block_size {
            return Err(AlgorithmError::InvalidParameter {
                name: "min_overlap".to_string(),
                reason: format!("must be smaller than block_size ({block_size})"),
            });
        }

        let backend = self.backend.as_ref().ok_or_else(|| {
            AlgorithmError::BackendUnavailable("no stardist inference script configured".to_string())
        })?;

        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input.png");
        let params_path = workdir.path().join("params.json");
        let output_path = workdir.path().join("labels.png");

        pixels.save(&input_path)?;
        let request = serde_json::json!({ "model": model, "parameters": params });
        std::fs::write(&params_path, serde_json::to_vec(&request)?)?;

        tracing::info!(model, script = %backend.script.display(), "running stardist backend");
        let result = Command::new(&backend.program)
            .args(&backend.args)
            .arg(&backend.script)
            .arg("--input")
            .arg(&input_path)
            .arg("--params")
            .arg(&params_path)
            .arg("--output")
            .arg(&output_path)
            .output()?;

        if !result.status.success() {
            return Err(AlgorithmError::Backend(format!(
                "stardist script exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let labels = image::open(&output_path)?.to_luma16();
        let mask = LabelMask::from_fn(labels.width(), labels.height(), |x, y| {
            Luma([u32::from(labels.get_pixel(x, y)[0])])
        });

        Ok(AlgoOutput::default().with_mask(mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use image::{GrayImage, ImageBuffer, RgbaImage};

    fn tile_params() -> ParameterMap {
        let mut params = ParameterMap::new();
        params.insert("block_size".into(), ParamValue::Int(2048));
        params.insert("min_overlap".into(), ParamValue::Int(128));
        params
    }

    #[test]
    fn test_model_follows_channel_count() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let rgb = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert_eq!(pretrained_model_for(&gray).ok(), Some("2D_versatile_fluo"));
        assert_eq!(pretrained_model_for(&rgb).ok(), Some("2D_versatile_he"));
    }

    #[test]
    fn test_rgba_input_rejected_before_backend() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let error = Stardist::default().invoke(&rgba, &tile_params()).unwrap_err();
        assert!(matches!(error, AlgorithmError::UnsupportedInput(_)));
    }

    #[test]
    fn test_bad_tile_parameters_rejected() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let mut params = tile_params();
        params.insert("block_size".into(), ParamValue::Text("big".into()));
        let error = Stardist::default().invoke(&gray, &params).unwrap_err();
        assert!(matches!(error, AlgorithmError::InvalidParameter { ref name, .. } if name == "block_size"));

        let mut params = tile_params();
        params.insert("min_overlap".into(), ParamValue::Int(4096));
        let error = Stardist::default().invoke(&gray, &params).unwrap_err();
        assert!(matches!(error, AlgorithmError::InvalidParameter { ref name, .. } if name == "min_overlap"));
    }

    #[test]
    fn test_missing_backend_reported() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let error = Stardist::default().invoke(&gray, &tile_params()).unwrap_err();
        assert!(matches!(error, AlgorithmError::BackendUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_output_becomes_mask() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("echo_labels.sh");
        // copies the input image to the output path: pixel values become labels
        std::fs::write(&script, "cp \"$2\" \"$6\"\n").expect("write script");

        let backend = StardistBackend {
            program: "sh".to_string(),
            script,
            args: Vec::new(),
        };

        // 16-bit so the copied values come back unscaled
        let mut gray = ImageBuffer::<Luma<u16>, Vec<u16>>::new(8, 8);
        gray.put_pixel(2, 3, Luma([5]));
        let output = Stardist::new(Some(backend))
            .invoke(&DynamicImage::ImageLuma16(gray), &tile_params())
            .expect("stardist run");

        let mask = output.mask.expect("mask");
        assert_eq!(mask.dimensions(), (8, 8));
        assert_eq!(mask.get_pixel(2, 3)[0], 5);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_backend_surfaces_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo 'model not found' >&2\nexit 3\n").expect("write script");

        let backend = StardistBackend {
            program: "sh".to_string(),
            script,
            args: Vec::new(),
        };
        let gray = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        match Stardist::new(Some(backend)).invoke(&gray, &tile_params()) {
            Err(AlgorithmError::Backend(message)) => assert!(message.contains("model not found")),
            other => panic!("expected backend failure, got {other:?}"),
        }
    }
}
