//! JSON document persistence
//!
//! Mapping presets and OSC templates share one on-disk convention:
//! pretty-printed JSON with camelCase keys, stored by default under the
//! platform config directory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Error type for preset/template persistence
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Failed to access preset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preset file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a document as indented JSON, creating parent directories
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PresetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    log::info!("Preset: Saved {}", path.display());
    Ok(())
}

/// Read a JSON document
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, PresetError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Default directory for user presets: `<config dir>/baton/presets`
pub fn default_preset_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("No config directory available on this platform"))?;
    Ok(base.join("baton").join("presets"))
}
