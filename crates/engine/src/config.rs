//! Engine configuration.
//!
//! Configuration is optional; [`EngineConfig::default`] matches the behavior
//! of an engine built without one. Files are YAML (JSON is accepted too, being
//! a YAML subset) and every field may be omitted.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default renderer base URL; the diagram is appended base64-encoded.
pub const DEFAULT_RENDERER_URL: &str = "https://mermaid.ink/img/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maintain the producer/consumer graph as actions are registered.
    pub track_graph: bool,
    /// Abort a run after this many loop iterations. Unlimited when absent.
    pub max_iterations: Option<u64>,
    /// Base URL of the external diagram renderer.
    pub renderer_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_graph: true,
            max_iterations: None,
            renderer_url: DEFAULT_RENDERER_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigRead`] when the file cannot be read and
    /// [`EngineError::ConfigParse`] when it is not a valid configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
