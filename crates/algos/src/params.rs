use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use ts_rs::TS;

use crate::registry::AlgoDescriptor;

/// Parameters supplied by a client, stored verbatim
pub type ParameterMap = BTreeMap<String, ParamValue>;

/// A supplied parameter value. Enumerated choices arrive as `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema, TS,
    Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParameterType {
    Int,
    Float,
    String,
    Bool,
    /// One of the parameter's enumerated `values`
    List,
}

/// Declared parameter of an algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
pub struct ParameterSpec {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl ParameterSpec {
    pub fn new(
        name: &str,
        display_name: &str,
        description: &str,
        param_type: ParameterType,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            param_type,
            default_value: None,
            values: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|value| value.to_string()).collect();
        self
    }
}

/// Presence-only check of supplied parameters against a descriptor.
///
/// Values are never inspected: type, range and choice membership are left to
/// the algorithm implementation.
pub struct ParameterValidator;

impl ParameterValidator {
    /// `false` for an unknown algorithm (`None` descriptor) or when any
    /// required parameter name is absent from `supplied`.
    pub fn validate(descriptor: Option<&AlgoDescriptor>, supplied: Option<&ParameterMap>) -> bool {
        match descriptor {
            Some(descriptor) => Self::missing(descriptor, supplied).is_empty(),
            None => false,
        }
    }

    /// Names of required parameters absent from `supplied`, in declaration order
    pub fn missing(descriptor: &AlgoDescriptor, supplied: Option<&ParameterMap>) -> Vec<String> {
        descriptor
            .required_parameters
            .iter()
            .filter(|spec| !supplied.is_some_and(|params| params.contains_key(&spec.name)))
            .map(|spec| spec.name.clone())
            .collect()
    }
}
