use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::store::RetryPolicy;

/// Tuning for the sync controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Load sync settings from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read sync config {}: {}", path.display(), e)
        })?;

        let config: SyncConfig = serde_yaml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse sync config YAML {}: {}", path.display(), e)
        })?;

        Ok(config)
    }
}
