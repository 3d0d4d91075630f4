//! Mapping preset persistence
//!
//! A preset is the full mapping set of one device plus descriptive metadata,
//! stored as indented camelCase JSON.

use crate::map::{CcMapping, NoteMapping};
use crate::preset_io::{self, PresetError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A persisted mapping set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cc_mappings: Vec<CcMapping>,
    #[serde(default)]
    pub note_mappings: Vec<NoteMapping>,
}

impl MappingPreset {
    /// Write this preset as indented JSON
    pub fn save(&self, path: &Path) -> Result<(), PresetError> {
        preset_io::save_json(self, path)
    }

    /// Load a preset from disk
    pub fn load(path: &Path) -> Result<Self, PresetError> {
        preset_io::load_json(path)
    }
}
