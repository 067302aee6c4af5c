use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocmapError, DocmapResult};

/// Configuration for a [`crate::Docmap`] handle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocmapConfig {
    /// Prepended verbatim to every resolved index name, e.g. `test_` to
    /// keep a test run apart from production indices.
    pub index_prefix: Option<String>,
}

impl DocmapConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            index_prefix: Some(prefix.into()),
        }
    }

    /// The prefix to apply, if any. An empty prefix counts as none.
    pub fn prefix(&self) -> Option<&str> {
        self.index_prefix.as_deref().filter(|prefix| !prefix.is_empty())
    }

    /// Parse a TOML document such as `index_prefix = "test_"`.
    pub fn from_toml_str(content: &str) -> DocmapResult<Self> {
        toml::from_str(content).map_err(|e| DocmapError::Config(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> DocmapResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocmapError::Config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> DocmapResult<String> {
        toml::to_string(self).map_err(|e| DocmapError::Config(e.to_string()))
    }
}
