//! OSC control-surface mapping engine
//!
//! Address-pattern based mapping (exact + wildcard), transport-command
//! recognition, multi-touch tracking, per-client feedback routing, and
//! controller layout templates.

mod engine;
pub mod templates;

pub use engine::{OscEngineConfig, OscSurfaceEngine};

use crate::preset_io::{self, PresetError};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// An OSC address to parameter mapping
///
/// The address may contain OSC wildcard segments (`/mixer/*/volume`);
/// wildcard mappings are consulted only when no exact address matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscAddressMapping {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// OSC address or address pattern
    pub address: String,

    /// Target parameter id (e.g. "track.3.volume")
    pub parameter_id: String,

    /// Output range; incoming values scale linearly into it
    pub min_value: f64,
    pub max_value: f64,

    #[serde(default = "default_true")]
    pub send_feedback: bool,

    #[serde(default = "default_true")]
    pub is_enabled: bool,

    /// Multi-touch correlation slot (0-9)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch_index: Option<u8>,
}

impl OscAddressMapping {
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = self.address.clone();
        }
    }
}

/// A page of mappings inside a template (tab/screen on the controller)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePage {
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<OscAddressMapping>,
}

/// A named controller layout: top-level mappings plus optional pages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Controller application this layout was authored for
    #[serde(default)]
    pub target_app: String,
    #[serde(default)]
    pub mappings: Vec<OscAddressMapping>,
    #[serde(default)]
    pub pages: Vec<TemplatePage>,
}

impl OscTemplate {
    /// All mappings with page-scoped ones flattened in
    pub fn flattened(&self) -> Vec<OscAddressMapping> {
        let mut all = self.mappings.clone();
        for page in &self.pages {
            all.extend(page.mappings.iter().cloned());
        }
        for m in &mut all {
            m.ensure_id();
        }
        all
    }

    /// Write this template as indented JSON
    pub fn save(&self, path: &Path) -> Result<(), PresetError> {
        preset_io::save_json(self, path)
    }

    /// Load a template from disk
    pub fn load(path: &Path) -> Result<Self, PresetError> {
        preset_io::load_json(path)
    }
}
