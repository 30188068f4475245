use image::DynamicImage;
use mask::{LabelMask, PolygonFeature};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use ts_rs::TS;

/// Keys an algorithm result can be populated under
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema, TS,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResultKey {
    Image,
    Mask,
    Features,
}

/// Result map produced by one algorithm run
#[derive(Debug, Clone, Default)]
pub struct AlgoOutput {
    pub image: Option<DynamicImage>,
    pub mask: Option<LabelMask>,
    pub features: Option<Vec<PolygonFeature>>,
}

/// A single stored result value
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Image(DynamicImage),
    Mask(LabelMask),
    Features(Vec<PolygonFeature>),
}

impl AlgoOutput {
    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_mask(mut self, mask: LabelMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_features(mut self, features: Vec<PolygonFeature>) -> Self {
        self.features = Some(features);
        self
    }

    /// Keys that carry a value
    pub fn keys(&self) -> Vec<ResultKey> {
        let mut keys = Vec::new();
        if self.image.is_some() {
            keys.push(ResultKey::Image);
        }
        if self.mask.is_some() {
            keys.push(ResultKey::Mask);
        }
        if self.features.is_some() {
            keys.push(ResultKey::Features);
        }
        keys
    }

    pub fn get(&self, key: ResultKey) -> Option<ResultValue> {
        match key {
            ResultKey::Image => self.image.clone().map(ResultValue::Image),
            ResultKey::Mask => self.mask.clone().map(ResultValue::Mask),
            ResultKey::Features => self.features.clone().map(ResultValue::Features),
        }
    }
}
