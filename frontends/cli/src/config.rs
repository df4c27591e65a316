use anyhow::Result;
use rolodex::SyncConfig;
use rolodex_firebase::FirebaseConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ROLODEX_CONFIG";
pub const API_KEY_ENV: &str = "ROLODEX_FIREBASE_API_KEY";
pub const PROJECT_ID_ENV: &str = "ROLODEX_FIREBASE_PROJECT_ID";

/// Application configuration, loaded from YAML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Firebase project; without it the app runs against the in-memory store
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;

        let config: AppConfig = serde_yaml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse config YAML {}: {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Load from `path` (or the default location, if it exists), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// `ROLODEX_FIREBASE_API_KEY` and `ROLODEX_FIREBASE_PROJECT_ID` win over
    /// the file.
    pub fn apply_env_overrides(&mut self) {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty());
        let project_id = std::env::var(PROJECT_ID_ENV).ok().filter(|v| !v.is_empty());
        if api_key.is_none() && project_id.is_none() {
            return;
        }

        let firebase = self.firebase.get_or_insert_with(FirebaseConfig::default);
        if let Some(api_key) = api_key {
            firebase.api_key = api_key;
        }
        if let Some(project_id) = project_id {
            firebase.project_id = project_id;
        }
    }
}

/// `$ROLODEX_CONFIG`, else `~/.config/rolodex/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    std::env::var_os("HOME").map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("rolodex");
        path.push("config.yaml");
        path
    })
}
