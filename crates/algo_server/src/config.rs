use std::fs;
use std::path::Path;

use algos::StardistBackend;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Server settings, read from an optional TOML file.
///
/// ```toml
/// log_filter = "algos=debug,info"
///
/// [stardist]
/// program = "python3"
/// script = "scripts/stardist_infer.py"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is not set
    #[serde(default)]
    pub log_filter: Option<String>,

    /// Inference script backing the `stardist` algorithm
    #[serde(default)]
    pub stardist: Option<StardistBackend>,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
