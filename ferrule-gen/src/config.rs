//! # Generator Configuration
//!
//! Settings are read from an optional JSON file. Every field is optional; missing fields take
//! their default value.
//!
//! ```json
//! {
//!   "file_suffix": ".ferrule.rs",
//!   "oneway_type": "ferrule.Oneway",
//!   "core_path": "::ferrule_core",
//!   "emit_descriptors": true
//! }
//! ```
use ferrule_core::shape::ONEWAY_TYPE;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Replaces the extension of each input file to name its generated file.
    pub file_suffix: String,
    /// Fully qualified message type marking a method as oneway.
    pub oneway_type: String,
    /// Path under which generated code reaches `ferrule_core`.
    pub core_path: String,
    /// Embeds the encoded descriptors of each file and its imports in the generated code.
    pub emit_descriptors: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            file_suffix: ".ferrule.rs".to_string(),
            oneway_type: ONEWAY_TYPE.to_string(),
            core_path: "::ferrule_core".to_string(),
            emit_descriptors: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': '{source}'")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file '{path}': '{source}'")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl GeneratorConfig {
    /// Loads the configuration stored at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
