use thiserror::Error;

use crate::registry::AlgoKind;

/// Failure raised inside an algorithm implementation
#[derive(Error, Debug)]
pub enum AlgorithmError {
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Backend not configured: {0}")]
    BackendUnavailable(String),

    #[error("Backend failed: {0}")]
    Backend(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Geometry extraction failed: {0}")]
    Geometry(#[from] mask::MaskError),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No implementation registered for algorithm {0}")]
    NotImplemented(AlgoKind),

    #[error("Algorithm {algorithm} failed: {source}")]
    ExecutionFailure {
        algorithm: AlgoKind,
        #[source]
        source: AlgorithmError,
    },
}

/// Inconsistent static descriptors, raised once when the registry is built
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Algorithm {0} is registered twice")]
    DuplicateAlgorithm(String),

    #[error("Algorithm id {id} is used by both {first} and {second}")]
    DuplicateId { id: u32, first: String, second: String },

    #[error("Algorithm {algorithm} declares parameter {parameter} more than once")]
    DuplicateParameter { algorithm: String, parameter: String },

    #[error("List parameter {parameter} of algorithm {algorithm} has no values")]
    MissingChoices { algorithm: String, parameter: String },
}

pub type Result<T> = std::result::Result<T, AlgorithmError>;
