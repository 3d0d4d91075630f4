//! Engine-to-host event delivery
//!
//! Engines never call back into the host directly. Every outward
//! notification is a `SurfaceEvent` pushed onto a bounded flume channel that
//! the host drains (typically once per UI tick). Overflow drops the event
//! with a warning rather than blocking a device callback thread.

use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// A typed parameter value
///
/// Replaces runtime type inspection of boxed values: OSC arguments and host
/// parameter updates are carried as an explicit variant with safe converters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    /// Numeric view; Bool maps to 1/0, Text parses or defaults to 0
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Float(v) => *v,
            ParamValue::Int(v) => *v as f64,
            ParamValue::Bool(true) => 1.0,
            ParamValue::Bool(false) => 0.0,
            ParamValue::Text(s) => s.parse().unwrap_or(0.0),
        }
    }

    /// Truthiness view: floats above 0.5, nonzero ints, Bool(true)
    pub fn as_bool(&self) -> bool {
        match self {
            ParamValue::Float(v) => *v > 0.5,
            ParamValue::Int(v) => *v != 0,
            ParamValue::Bool(b) => *b,
            ParamValue::Text(s) => !s.is_empty(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v as f64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

/// Where a parameter change originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSource {
    /// A mapped MIDI control change
    MidiCc { channel: u8, cc: u8 },
    /// A mapped OSC address
    Osc { address: String },
}

/// Named transport buttons shared by the MCU and OSC engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportButton {
    Rewind,
    FastForward,
    Stop,
    Play,
    Record,
    Cycle,
    Click,
    SoloDefeat,
}

/// Per-strip button groups on an MCU surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripButtonKind {
    RecordArm,
    Solo,
    Mute,
    Select,
}

/// Notification from an engine to the host
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// A mapped control changed a named parameter
    ParameterChanged {
        parameter_id: String,
        /// Protocol-native value before scaling (0-127, 0-16383, or OSC float)
        raw: f64,
        /// Value scaled into the mapping's output range
        scaled: f64,
        source: ControlSource,
    },
    /// A note-mapped action fired
    NoteTrigger {
        action: String,
        pressed: bool,
        velocity: u8,
    },
    /// A transport button changed state
    TransportButton {
        button: TransportButton,
        pressed: bool,
    },
    /// The MCU bank window moved
    BankChanged { bank: usize },
    /// Transport-level connection state flipped
    ConnectionChanged { connected: bool },
    /// Raw CC observed, before any mapping (for monitoring UIs)
    RawCc { channel: u8, cc: u8, value: u8 },
    /// Raw note observed, before any mapping
    RawNote {
        channel: u8,
        note: u8,
        velocity: u8,
        on: bool,
    },
    /// Learn mode consumed a message and produced a mapping
    MappingLearned {
        mapping_id: String,
        parameter_id: String,
        channel: u8,
        cc: u8,
    },
    /// A strip button toggled channel state on an MCU surface
    StripButton {
        channel: u8,
        kind: StripButtonKind,
        active: bool,
    },
    /// V-Pot rotation or push on an MCU strip
    VPot {
        channel: u8,
        delta: i32,
        pressed: bool,
    },
    /// Fader moved or touch state changed on an MCU strip
    FaderMoved {
        channel: u8,
        value: u16,
        touched: bool,
    },
    /// Master fader position (not strip-backed)
    MasterFader { value: u16 },
    /// An OSC "multi" message delivered its numeric arguments
    MultiTouch { values: Vec<f32> },
    /// A tracked OSC touch point moved
    TouchPoint { index: u8, x: f32, y: f32 },
    /// An OSC message matched nothing
    UnmappedOsc { address: String },
}

/// Sending half of an engine's event channel
///
/// All emission funnels through `emit` so overflow handling and logging live
/// in exactly one place.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<SurfaceEvent>,
}

/// Capacity of every engine event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

impl EventSender {
    /// Create a channel pair; the receiver goes to the host
    pub fn channel() -> (Self, Receiver<SurfaceEvent>) {
        let (tx, rx) = flume::bounded(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Push an event, dropping with a warning when the host is behind
    pub fn emit(&self, event: SurfaceEvent) {
        if self.tx.try_send(event).is_err() {
            log::warn!("Surface: Event channel full, dropping event");
        }
    }
}
