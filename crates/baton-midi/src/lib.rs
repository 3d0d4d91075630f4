//! Raw MIDI transport for baton control surfaces
//!
//! This crate provides:
//! - MIDI port discovery and connection via midir
//! - Channel-voice message parsing and encoding
//! - Input bridging from the midir callback to a flume channel
//! - The `MidiSender` seam the protocol engines send feedback through
//!
//! # Architecture
//!
//! ```text
//! MIDI Device → midir callback → flume channel → host poll → engine
//! ```
//!
//! The midir callback runs on the driver thread and must stay non-blocking;
//! everything downstream is bridged through a bounded channel.

mod connection;
mod event;
mod input;
mod output;

pub use connection::{MidiConnection, MidiConnectionError};
pub use event::MidiEvent;
pub use input::MidiInputHandler;
pub use output::{MidiOutputHandler, MidiSender};
