//! Mackie Control Universal protocol engine
//!
//! Decodes the fixed MCU message layout (button notes, V-Pot relative CCs,
//! 14-bit pitch-bend faders) into a banked 8-strip channel window and
//! encodes LED/display/fader-motor feedback.

mod engine;
pub mod protocol;
mod strip;

pub use engine::McuEngine;
pub use protocol::STRIPS_PER_BANK;
pub use strip::ChannelStrip;

use serde::{Deserialize, Serialize};

/// Control-surface protocol family
///
/// Only MCU decoding is implemented; `Hui` is accepted so hosts can persist
/// the device choice, but messages are decoded through the MCU tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Mcu,
    Hui,
}

/// V-Pot LED ring display mode (3-bit field in the feedback byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VPotMode {
    SingleDot = 0,
    BoostCut = 1,
    Wrap = 2,
    Spread = 3,
}
