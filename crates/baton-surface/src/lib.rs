//! Control-surface protocol engines for baton
//!
//! This crate provides the three engines that sit between raw MIDI/OSC
//! transports and the host's mixer model:
//!
//! - `map`: generic CC/Note learn-and-map engine with curve scaling,
//!   14-bit CC reconstruction, soft takeover, and scaled feedback,
//!   persisted as JSON presets
//! - `mcu`: Mackie Control Universal protocol engine with a banked 8-strip
//!   channel window, button/V-Pot/fader decode, LED/motor/display feedback
//! - `osc`: OSC address-pattern mapping engine with transport commands,
//!   multi-touch tracking, wildcard routing, per-client feedback fan-out,
//!   and controller layout templates
//!
//! # Architecture
//!
//! ```text
//! transport thread → engine.process_*() → flume channel → host poll
//! host mixer tick  → engine.update_*()  → MidiSender / OscSink
//! ```
//!
//! Each engine serializes its state behind one mutex and is safe to drive
//! from a transport delivery thread and a host refresh thread concurrently.
//! Nothing on the decode or feedback paths panics or propagates errors: a
//! disconnected surface degrades to log lines and absent feedback.

pub mod curve;
pub mod events;
pub mod map;
pub mod mcu;
pub mod osc;

mod error;
mod preset_io;

pub use curve::ResponseCurve;
pub use error::MappingError;
pub use events::{
    ControlSource, EventSender, ParamValue, StripButtonKind, SurfaceEvent, TransportButton,
};
pub use map::{CcMapping, MappingPreset, MidiMapEngine, NoteMapping};
pub use mcu::{ChannelStrip, McuEngine, Protocol, VPotMode};
pub use osc::{OscAddressMapping, OscEngineConfig, OscSurfaceEngine, OscTemplate, TemplatePage};
pub use preset_io::{default_preset_dir, PresetError};
