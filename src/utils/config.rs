use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "feed_config.json";
pub const DEFAULT_DB_FILE: &str = "feed_data.db";

/// Settings persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub target_dir: String,
}

impl Settings {
    /// The configured ingestion root, if one is set and still a directory.
    pub fn root(&self) -> Option<PathBuf> {
        if self.target_dir.is_empty() {
            return None;
        }
        validate_root(&self.target_dir).ok()
    }
}

/// Loads settings from `path`. A missing or unreadable file yields defaults.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }

    match fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| serde_json::from_slice::<Settings>(&bytes).map_err(anyhow::Error::from))
    {
        Ok(settings) => {
            info!("Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            warn!("Ignoring unreadable settings file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let body = serde_json::to_vec_pretty(settings)?;
    fs::write(path, body).with_context(|| format!("Failed to write settings to {:?}", path))?;
    Ok(())
}

/// Checks that `raw` names an existing directory.
pub fn validate_root(raw: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    let metadata = fs::metadata(&path).map_err(|_| anyhow!("Path not found: {}", raw))?;
    if !metadata.is_dir() {
        return Err(anyhow!("Not a directory: {}", raw));
    }
    Ok(path)
}
