//! Init metadata recording which model a repository was initialised with.

use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::types::{now_iso, parse_commit_date};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents of `cache/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitMetadata {
    pub model_name: String,
    pub initialized_at: String,
}

impl InitMetadata {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            initialized_at: now_iso(),
        }
    }

    /// Save metadata to file
    pub fn save(&self, path: &Path) -> GitsemResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GitsemError::General(format!("Failed to serialize metadata: {e}")))?;
        super::write_atomic(path, json.as_bytes())
    }

    /// Load metadata from file. `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> GitsemResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path).read_path(path)?;
        let metadata: InitMetadata = serde_json::from_str(&json)
            .map_err(|e| GitsemError::format(path, format!("invalid metadata: {e}")))?;

        if metadata.model_name.trim().is_empty() {
            return Err(GitsemError::format(path, "modelName is empty"));
        }
        if parse_commit_date(&metadata.initialized_at).is_none() {
            return Err(GitsemError::format(
                path,
                format!("initializedAt '{}' is not a date", metadata.initialized_at),
            ));
        }

        Ok(Some(metadata))
    }
}
