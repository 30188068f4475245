use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("No closed contour could be traced for label {label}")]
    NoContour { label: u32 },

    #[error("Geometric computation error: {0}")]
    GeometricComputation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MaskError>;
