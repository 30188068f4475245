use std::collections::HashSet;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr, VariantNames};
use ts_rs::TS;

use crate::{
    error::RegistryError,
    output::ResultKey,
    params::{ParamValue, ParameterMap, ParameterSpec, ParameterType, ParameterValidator},
};

/// Every algorithm the server knows about
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema, TS,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlgoKind {
    /// Synthetic three-object mask, for client integration
    Example,
    /// Star-convex nucleus detection through an external inference script
    Stardist,
    /// Otsu threshold followed by connected-component labelling
    OtsuThreshold,
}

/// Expected shape of the input array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
pub struct InputDataFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl InputDataFormat {
    pub fn image_2d() -> Self {
        Self { kind: "2D image".to_string() }
    }
}

/// Static description of an algorithm: identity, parameter schema, outputs
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, TS)]
#[ts(export)]
pub struct AlgoDescriptor {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub input_data_format: InputDataFormat,
    pub required_parameters: Vec<ParameterSpec>,
    pub output_endpoints: Vec<ResultKey>,
    #[serde(skip)]
    pub kind: AlgoKind,
}

impl AlgoDescriptor {
    pub fn declares(&self, key: ResultKey) -> bool {
        self.output_endpoints.contains(&key)
    }
}

impl AlgoKind {
    pub fn id(&self) -> u32 {
        match self {
            Self::Example => 1,
            Self::Stardist => 2,
            Self::OtsuThreshold => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Example => "Description for example algorithm",
            Self::Stardist => "Object detection with star-convex shapes",
            Self::OtsuThreshold => {
                "Global Otsu threshold followed by 8-connected component labelling"
            }
        }
    }

    #[allow(clippy::approx_constant)]
    pub fn required_parameters(&self) -> Vec<ParameterSpec> {
        use ParameterType::{Bool, Float, Int, List};
        match self {
            Self::Example => vec![
                ParameterSpec::new("integer_value", "Integer value", "Description for integer value", Int)
                    .with_default(122),
                ParameterSpec::new("float_value", "Float value", "Description for float value", Float)
                    .with_default(3.1415),
                ParameterSpec::new("string_value", "String value", "Description for string value", ParameterType::String)
                    .with_default("this_value"),
                ParameterSpec::new("boolean_value", "Test boolean", "Test test", Bool)
                    .with_default(true),
                ParameterSpec::new("choices", "Choices", "Description for choices", List)
                    .with_values(&["Option A", "Option B"]),
            ],
            Self::Stardist => vec![
                ParameterSpec::new("model_name", "Model", "Pretrained stardist model name", List)
                    .with_values(&["2D_versatile_he", "2D_versatile_fluo"]),
                ParameterSpec::new(
                    "prob_thresh",
                    "Probability threshold",
                    "Consider only object candidates from pixels with predicted object probability above this threshold",
                    Float,
                )
                .with_default(0.5),
                ParameterSpec::new(
                    "nms_thresh",
                    "Overlap threshold",
                    "Perform non-maximum suppression that considers two objects to be the same when their area/surface overlap exceeds this threshold",
                    Float,
                )
                .with_default(0.4),
                ParameterSpec::new(
                    "scale",
                    "Scale",
                    "Scale the input image internally by this factor and rescale the output accordingly (<1 to downsample, >1 to upsample)",
                    Float,
                )
                .with_default(1.0),
                ParameterSpec::new("block_size", "Tile size", "Process input image in tiles of the provided shape", Int)
                    .with_default(2048),
                ParameterSpec::new(
                    "min_overlap",
                    "Tile overlap",
                    "Amount of guaranteed overlap between tiles (All predicted object instances should be smaller than this value!)",
                    Int,
                )
                .with_default(128),
            ],
            Self::OtsuThreshold => vec![],
        }
    }

    pub fn output_endpoints(&self) -> Vec<ResultKey> {
        match self {
            Self::Example => vec![ResultKey::Image, ResultKey::Features],
            Self::Stardist | Self::OtsuThreshold => vec![ResultKey::Mask, ResultKey::Features],
        }
    }

    pub fn descriptor(&self) -> AlgoDescriptor {
        AlgoDescriptor {
            id: self.id(),
            name: self.to_string(),
            description: self.description().to_string(),
            input_data_format: InputDataFormat::image_2d(),
            required_parameters: self.required_parameters(),
            output_endpoints: self.output_endpoints(),
            kind: *self,
        }
    }

    /// Get a list of all algorithm names
    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }
}

/// Immutable catalogue of algorithm descriptors, built once at startup
#[derive(Debug, Clone)]
pub struct AlgoRegistry {
    descriptors: Vec<AlgoDescriptor>,
}

impl AlgoRegistry {
    /// Registry of every [`AlgoKind`], in declaration order
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_descriptors(AlgoKind::iter().map(|kind| kind.descriptor()).collect())
    }

    /// Build from explicit descriptors, rejecting inconsistent ones
    pub fn from_descriptors(descriptors: Vec<AlgoDescriptor>) -> Result<Self, RegistryError> {
        let mut names = HashSet::new();
        let mut ids: Vec<(u32, &str)> = Vec::new();

        for descriptor in &descriptors {
            if !names.insert(descriptor.name.as_str()) {
                return Err(RegistryError::DuplicateAlgorithm(descriptor.name.clone()));
            }
            if let Some((_, first)) = ids.iter().find(|(id, _)| *id == descriptor.id) {
                return Err(RegistryError::DuplicateId {
                    id: descriptor.id,
                    first: first.to_string(),
                    second: descriptor.name.clone(),
                });
            }
            ids.push((descriptor.id, descriptor.name.as_str()));

            let mut parameters = HashSet::new();
            for spec in &descriptor.required_parameters {
                if !parameters.insert(spec.name.as_str()) {
                    return Err(RegistryError::DuplicateParameter {
                        algorithm: descriptor.name.clone(),
                        parameter: spec.name.clone(),
                    });
                }
                if spec.param_type == ParameterType::List && spec.values.is_empty() {
                    return Err(RegistryError::MissingChoices {
                        algorithm: descriptor.name.clone(),
                        parameter: spec.name.clone(),
                    });
                }
            }
        }

        Ok(Self { descriptors })
    }

    /// Algorithm names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.describe(name).is_some()
    }

    pub fn describe(&self, name: &str) -> Option<&AlgoDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn describe_kind(&self, kind: AlgoKind) -> Option<&AlgoDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    /// Resolve a name to its registered kind
    pub fn resolve(&self, name: &str) -> Option<AlgoKind> {
        let kind = AlgoKind::from_str(name).ok()?;
        self.describe_kind(kind).map(|d| d.kind)
    }

    /// Empty for algorithms without parameters and for unknown names
    pub fn required_parameters(&self, name: &str) -> &[ParameterSpec] {
        self.describe(name)
            .map(|d| d.required_parameters.as_slice())
            .unwrap_or(&[])
    }

    pub fn validate(&self, name: &str, supplied: Option<&ParameterMap>) -> bool {
        ParameterValidator::validate(self.describe(name), supplied)
    }

    pub fn descriptors(&self) -> &[AlgoDescriptor] {
        &self.descriptors
    }

    /// Default values of the declared parameters that have one
    pub fn defaults(&self, name: &str) -> ParameterMap {
        self.required_parameters(name)
            .iter()
            .filter_map(|spec| {
                spec.default_value
                    .clone()
                    .map(|value: ParamValue| (spec.name.clone(), value))
            })
            .collect()
    }
}
