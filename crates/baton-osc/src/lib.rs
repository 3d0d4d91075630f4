//! OSC UDP transport for baton control surfaces
//!
//! This crate provides:
//! - A UDP listener decoding OSC packets on a background thread
//! - A sender encoding one OSC message per datagram
//! - The `OscSink` seam the OSC mapping engine sends feedback through
//!
//! Packet encode/decode and wildcard address matching come from `rosc`;
//! bundles are flattened into their member messages on receive.

mod sender;
mod server;

pub use sender::{OscSender, OscSink};
pub use server::{OscServer, OscServerError};

// Re-exported so engine crates speak rosc types without a direct dependency.
pub use rosc::{self, OscMessage, OscType};
