use std::path::PathBuf;

use algos::{AlgoKind, DispatchError, ResultKey};
use schemars::JsonSchema;
use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;
use ts_rs::TS;

/// Stable identifier of a failure, for clients that branch on the kind
/// rather than on the message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, JsonSchema, TS,
    Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[ts(export)]
pub enum ErrorKind {
    UnknownAlgorithm,
    InvalidParameters,
    NoAlgorithmSelected,
    NoImageLoaded,
    NoResultAvailable,
    UnsupportedMediaType,
    AlgorithmExecutionFailure,
    StaleResult,
    InternalError,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown algorithm {0}")]
    UnknownAlgorithm(String),

    #[error("Incorrect parameters for {algorithm}, missing: {}", .missing.join(", "))]
    InvalidParameters { algorithm: AlgoKind, missing: Vec<String> },

    #[error("No algorithm selected")]
    NoAlgorithmSelected,

    #[error("No image loaded")]
    NoImageLoaded,

    #[error("No {key} result available")]
    NoResultAvailable { key: ResultKey },

    #[error("Algorithm {algorithm} failed")]
    AlgorithmExecutionFailure {
        algorithm: AlgoKind,
        #[source]
        source: DispatchError,
    },

    #[error("Result of {algorithm} discarded: the selection changed while it was running")]
    StaleResult { algorithm: AlgoKind },

    #[error("Processing task aborted: {0}")]
    TaskAborted(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAlgorithm(_) => ErrorKind::UnknownAlgorithm,
            Self::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            Self::NoAlgorithmSelected => ErrorKind::NoAlgorithmSelected,
            Self::NoImageLoaded => ErrorKind::NoImageLoaded,
            Self::NoResultAvailable { .. } => ErrorKind::NoResultAvailable,
            Self::AlgorithmExecutionFailure { .. } => ErrorKind::AlgorithmExecutionFailure,
            Self::StaleResult { .. } => ErrorKind::StaleResult,
            Self::TaskAborted(_) => ErrorKind::InternalError,
        }
    }
}

/// Image codec failures
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Undecodable image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Cannot read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Label {0} does not fit a 16-bit mask image")]
    LabelOutOfRange(u32),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Base64(_) | Self::Decode(_) | Self::Read { .. } => ErrorKind::UnsupportedMediaType,
            Self::Encode(_) | Self::LabelOutOfRange(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
