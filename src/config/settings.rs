//! Loading and saving `ProbeConfig` files

use anyhow::{Context, Result};
use gpu_probe_types::ProbeConfig;
use std::path::{Path, PathBuf};

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "gpu-probe")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(dirs.config_dir().join("config.json"))
}

/// Load configuration from the default location, or defaults if there is no file
pub fn load() -> Result<ProbeConfig> {
    let path = config_path()?;

    if !path.exists() {
        log::debug!("No config file at {}, using defaults", path.display());
        return Ok(ProbeConfig::default());
    }

    load_from_path(&path)
}

/// Load configuration from a specific file path
pub fn load_from_path(path: &Path) -> Result<ProbeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Save configuration to a specific file path
pub fn save_to_path(config: &ProbeConfig, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
