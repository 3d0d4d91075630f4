//! Generic CC/Note learn-and-map engine
//!
//! Maps arbitrary incoming MIDI control changes and notes to named
//! parameters via user-defined or learned mappings, with curve scaling,
//! 14-bit CC reconstruction, soft-takeover gating, and scaled feedback.

mod engine;
mod preset;

pub use engine::MidiMapEngine;
pub use preset::MappingPreset;

use crate::curve::ResponseCurve;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A control-change to parameter mapping
///
/// Serialized camelCase inside preset documents. The runtime fields
/// (`last_value`, `takeover_engaged`) are transient and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcMapping {
    /// Opaque identity; filled from (channel, cc) when absent in a preset
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// MIDI channel filter: -1 = omni, 0-15 = exact
    pub channel: i8,

    /// CC number (0-127)
    pub cc_number: u8,

    /// Target parameter id (e.g. "track.1.volume")
    pub parameter_id: String,

    /// Human-readable label
    #[serde(default)]
    pub name: String,

    /// Output range
    pub min_value: f64,
    pub max_value: f64,

    /// Response curve between normalized input and output range
    #[serde(default)]
    pub curve: ResponseCurve,

    /// Send scaled feedback back out when the parameter changes host-side
    #[serde(default = "default_true")]
    pub send_feedback: bool,

    #[serde(default = "default_true")]
    pub is_enabled: bool,

    /// Combine with the cached LSB from CC+32 into a 14-bit value
    #[serde(default)]
    pub is_14_bit: bool,

    /// Gate incoming values until the physical control catches up
    #[serde(default)]
    pub soft_takeover: bool,

    /// Last scaled value routed through this mapping
    #[serde(skip)]
    pub last_value: f64,

    /// Soft takeover has caught up and values pass through
    #[serde(skip)]
    pub takeover_engaged: bool,
}

impl CcMapping {
    /// Mapping id derived from the control address, used when learning
    pub fn derived_id(channel: i8, cc_number: u8) -> String {
        format!("cc{}.{}", channel, cc_number)
    }

    /// Fill an empty id from the control address
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = Self::derived_id(self.channel, self.cc_number);
        }
    }

    /// Does this mapping listen on the given channel?
    pub fn matches_channel(&self, channel: u8) -> bool {
        self.channel < 0 || self.channel == channel as i8
    }
}

/// A note to action mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMapping {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// MIDI channel filter: -1 = omni, 0-15 = exact
    pub channel: i8,

    /// Note number (0-127)
    pub note_number: u8,

    /// Target action id (e.g. "transport.play")
    pub action: String,

    #[serde(default)]
    pub name: String,

    /// Momentary fires on press only; toggle fires on both edges
    #[serde(default = "default_true")]
    pub momentary_mode: bool,

    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl NoteMapping {
    pub(crate) fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = format!("note{}.{}", self.channel, self.note_number);
        }
    }

    pub fn matches_channel(&self, channel: u8) -> bool {
        self.channel < 0 || self.channel == channel as i8
    }
}

/// Active learn session
///
/// At most one per engine instance; consumed by the first incoming CC.
#[derive(Debug, Clone)]
pub struct LearnSession {
    pub parameter_id: String,
    pub min_value: f64,
    pub max_value: f64,
    pub curve: ResponseCurve,
}
