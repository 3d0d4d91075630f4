//! The CC/Note mapping engine
//!
//! All state lives behind one mutex: the engine is driven concurrently from
//! the MIDI delivery thread (`process_*`) and the host's refresh thread
//! (`update_parameter`), and outgoing sends are serialized under the same
//! lock so feedback never interleaves with another send.

use crate::curve::{normalize_to_range, ResponseCurve};
use crate::error::MappingError;
use crate::events::{ControlSource, EventSender, ParamValue, SurfaceEvent};
use crate::map::{CcMapping, LearnSession, MappingPreset, NoteMapping};
use baton_midi::{MidiEvent, MidiSender};
use flume::Receiver;
use std::collections::HashMap;
use std::sync::Mutex;

/// Soft takeover: normalized distance within which the physical control is
/// considered caught up with the software value.
const SOFT_TAKEOVER_THRESHOLD: f64 = 0.05;

struct Inner {
    cc_mappings: Vec<CcMapping>,
    note_mappings: Vec<NoteMapping>,
    learn: Option<LearnSession>,
    /// Most recent LSB per (channel, base CC) for 14-bit pairs
    lsb_cache: HashMap<(u8, u8), u8>,
    /// Current value per parameter id, scaled into mapping range
    param_values: HashMap<String, f64>,
    sender: Box<dyn MidiSender + Send>,
}

/// Generic MIDI CC/Note mapping engine
pub struct MidiMapEngine {
    inner: Mutex<Inner>,
    events: EventSender,
}

impl MidiMapEngine {
    /// Create an engine sending feedback through `sender`
    ///
    /// Returns the engine and the event receiver the host drains.
    pub fn new(sender: Box<dyn MidiSender + Send>) -> (Self, Receiver<SurfaceEvent>) {
        let (events, rx) = EventSender::channel();
        let engine = Self {
            inner: Mutex::new(Inner {
                cc_mappings: Vec::new(),
                note_mappings: Vec::new(),
                learn: None,
                lsb_cache: HashMap::new(),
                param_values: HashMap::new(),
                sender,
            }),
            events,
        };
        (engine, rx)
    }

    /// Dispatch a decoded transport event to the CC or Note path
    pub fn process_event(&self, event: &MidiEvent) {
        match *event {
            MidiEvent::ControlChange { channel, controller, value } => {
                self.process_cc(channel, controller, value)
            }
            MidiEvent::NoteOn { channel, note, velocity } => {
                self.process_note(channel, note, velocity, true)
            }
            MidiEvent::NoteOff { channel, note, velocity } => {
                self.process_note(channel, note, velocity, false)
            }
            MidiEvent::PitchBend { .. } => {} // not mappable in the generic engine
        }
    }

    /// Process an incoming control change
    pub fn process_cc(&self, channel: u8, cc: u8, value: u8) {
        let mut inner = self.inner.lock().unwrap();

        // Monitoring UIs see every CC regardless of mapping state
        self.events.emit(SurfaceEvent::RawCc { channel, cc, value });

        // An active learn session consumes the message outright
        if let Some(session) = inner.learn.take() {
            self.learn_from_cc(&mut inner, session, channel, cc);
            return;
        }

        // CC 32-63 is the reserved LSB half of a 14-bit pair; cache, never map
        if (32..=63).contains(&cc) {
            inner.lsb_cache.insert((channel, cc - 32), value);
            return;
        }

        let Inner {
            cc_mappings,
            lsb_cache,
            param_values,
            ..
        } = &mut *inner;

        for mapping in cc_mappings
            .iter_mut()
            .filter(|m| m.is_enabled && m.cc_number == cc && m.matches_channel(channel))
        {
            let (effective, resolution) = if mapping.is_14_bit {
                let lsb = lsb_cache.get(&(channel, cc)).copied().unwrap_or(0);
                ((((value as u16) << 7) | lsb as u16) as f64, 16383.0)
            } else {
                (value as f64, 127.0)
            };
            let normalized = effective / resolution;

            if mapping.soft_takeover && !mapping.takeover_engaged {
                let current = param_values
                    .get(&mapping.parameter_id)
                    .copied()
                    .unwrap_or(mapping.min_value);
                let current_norm =
                    normalize_to_range(current, mapping.min_value, mapping.max_value);
                if (normalized - current_norm).abs() > SOFT_TAKEOVER_THRESHOLD {
                    // Physical control hasn't caught up; drop silently
                    log::trace!(
                        "Map: Soft takeover gating cc {} on ch {} ({:.3} vs {:.3})",
                        cc,
                        channel,
                        normalized,
                        current_norm
                    );
                    continue;
                }
                mapping.takeover_engaged = true;
            }

            let scaled = mapping
                .curve
                .scale(normalized, mapping.min_value, mapping.max_value);
            mapping.last_value = scaled;
            param_values.insert(mapping.parameter_id.clone(), scaled);

            self.events.emit(SurfaceEvent::ParameterChanged {
                parameter_id: mapping.parameter_id.clone(),
                raw: effective,
                scaled,
                source: ControlSource::MidiCc { channel, cc },
            });
        }
    }

    fn learn_from_cc(&self, inner: &mut Inner, session: LearnSession, channel: u8, cc: u8) {
        let existing = inner
            .cc_mappings
            .iter()
            .position(|m| m.channel == channel as i8 && m.cc_number == cc);

        let (mapping_id, parameter_id) = match existing {
            Some(index) => {
                let mapping = &mut inner.cc_mappings[index];
                mapping.parameter_id = session.parameter_id.clone();
                mapping.min_value = session.min_value;
                mapping.max_value = session.max_value;
                mapping.curve = session.curve;
                mapping.takeover_engaged = false;
                (mapping.id.clone(), mapping.parameter_id.clone())
            }
            None => {
                let id = CcMapping::derived_id(channel as i8, cc);
                inner.cc_mappings.push(CcMapping {
                    id: id.clone(),
                    channel: channel as i8,
                    cc_number: cc,
                    parameter_id: session.parameter_id.clone(),
                    name: String::new(),
                    min_value: session.min_value,
                    max_value: session.max_value,
                    curve: session.curve,
                    send_feedback: true,
                    is_enabled: true,
                    is_14_bit: false,
                    soft_takeover: false,
                    last_value: 0.0,
                    takeover_engaged: false,
                });
                (id, session.parameter_id)
            }
        };

        log::info!(
            "Map: Learned cc {} on ch {} -> {}",
            cc,
            channel,
            parameter_id
        );
        self.events.emit(SurfaceEvent::MappingLearned {
            mapping_id,
            parameter_id,
            channel,
            cc,
        });
    }

    /// Process an incoming note on/off
    pub fn process_note(&self, channel: u8, note: u8, velocity: u8, is_on: bool) {
        let inner = self.inner.lock().unwrap();

        self.events.emit(SurfaceEvent::RawNote {
            channel,
            note,
            velocity,
            on: is_on,
        });

        // Notes never consume a learn session

        for mapping in inner
            .note_mappings
            .iter()
            .filter(|m| m.is_enabled && m.note_number == note && m.matches_channel(channel))
        {
            if mapping.momentary_mode {
                if is_on && velocity > 0 {
                    self.events.emit(SurfaceEvent::NoteTrigger {
                        action: mapping.action.clone(),
                        pressed: true,
                        velocity,
                    });
                }
            } else {
                self.events.emit(SurfaceEvent::NoteTrigger {
                    action: mapping.action.clone(),
                    pressed: is_on,
                    velocity,
                });
            }
        }
    }

    /// Start a learn session, overwriting any prior one
    pub fn start_learning(
        &self,
        parameter_id: &str,
        min_value: f64,
        max_value: f64,
        curve: ResponseCurve,
    ) -> Result<(), MappingError> {
        if parameter_id.is_empty() {
            return Err(MappingError::EmptyParameterId);
        }
        let mut inner = self.inner.lock().unwrap();
        inner.learn = Some(LearnSession {
            parameter_id: parameter_id.to_string(),
            min_value,
            max_value,
            curve,
        });
        log::info!("Map: Learn mode armed for {}", parameter_id);
        Ok(())
    }

    /// Cancel the active learn session, if any
    pub fn cancel_learning(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.learn.take().is_some() {
            log::info!("Map: Learn mode cancelled");
        }
    }

    /// Is a learn session active?
    pub fn is_learning(&self) -> bool {
        self.inner.lock().unwrap().learn.is_some()
    }

    /// Feedback path: the host's parameter changed, reflect it to the surface
    ///
    /// Accepts any typed value; booleans arrive as 0/1, ints as-is.
    pub fn update_parameter(&self, parameter_id: &str, value: impl Into<ParamValue>) {
        let value = value.into().as_f64();
        let mut inner = self.inner.lock().unwrap();
        let Inner {
            cc_mappings,
            param_values,
            sender,
            ..
        } = &mut *inner;

        param_values.insert(parameter_id.to_string(), value);

        for mapping in cc_mappings.iter_mut().filter(|m| {
            m.is_enabled && m.send_feedback && m.parameter_id == parameter_id
        }) {
            let normalized = normalize_to_range(value, mapping.min_value, mapping.max_value);
            // Omni mappings have no inbound channel; feedback defaults to 0
            let channel = if mapping.channel < 0 {
                0
            } else {
                mapping.channel as u8
            };

            if mapping.is_14_bit {
                let value14 = (normalized * 16383.0).round() as u16;
                sender.send_event(&MidiEvent::ControlChange {
                    channel,
                    controller: mapping.cc_number,
                    value: (value14 >> 7) as u8,
                });
                sender.send_event(&MidiEvent::ControlChange {
                    channel,
                    controller: mapping.cc_number + 32,
                    value: (value14 & 0x7F) as u8,
                });
            } else {
                sender.send_event(&MidiEvent::ControlChange {
                    channel,
                    controller: mapping.cc_number,
                    value: (normalized * 127.0).round() as u8,
                });
            }

            mapping.last_value = value;
            // Feedback moved the software value; the physical control must
            // catch up again before its messages pass the gate
            mapping.takeover_engaged = false;
        }
    }

    /// Current value of a parameter, if any mapping has routed one
    pub fn parameter_value(&self, parameter_id: &str) -> Option<f64> {
        self.inner
            .lock()
            .unwrap()
            .param_values
            .get(parameter_id)
            .copied()
    }

    /// Add or replace (by id) a CC mapping
    pub fn add_cc_mapping(&self, mut mapping: CcMapping) -> Result<(), MappingError> {
        if mapping.parameter_id.is_empty() {
            return Err(MappingError::EmptyParameterId);
        }
        if !(-1..=15).contains(&mapping.channel) {
            return Err(MappingError::ChannelOutOfRange(mapping.channel));
        }
        if mapping.cc_number > 127 {
            return Err(MappingError::NumberOutOfRange(mapping.cc_number));
        }
        mapping.ensure_id();

        let mut inner = self.inner.lock().unwrap();
        match inner.cc_mappings.iter().position(|m| m.id == mapping.id) {
            Some(index) => inner.cc_mappings[index] = mapping,
            None => inner.cc_mappings.push(mapping),
        }
        Ok(())
    }

    /// Add or replace (by id) a note mapping
    pub fn add_note_mapping(&self, mut mapping: NoteMapping) -> Result<(), MappingError> {
        if mapping.action.is_empty() {
            return Err(MappingError::EmptyParameterId);
        }
        if !(-1..=15).contains(&mapping.channel) {
            return Err(MappingError::ChannelOutOfRange(mapping.channel));
        }
        if mapping.note_number > 127 {
            return Err(MappingError::NumberOutOfRange(mapping.note_number));
        }
        mapping.ensure_id();

        let mut inner = self.inner.lock().unwrap();
        match inner.note_mappings.iter().position(|m| m.id == mapping.id) {
            Some(index) => inner.note_mappings[index] = mapping,
            None => inner.note_mappings.push(mapping),
        }
        Ok(())
    }

    /// Remove a CC mapping by id; false if absent
    pub fn remove_cc_mapping(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.cc_mappings.len();
        inner.cc_mappings.retain(|m| m.id != id);
        inner.cc_mappings.len() != before
    }

    /// Remove a note mapping by id; false if absent
    pub fn remove_note_mapping(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.note_mappings.len();
        inner.note_mappings.retain(|m| m.id != id);
        inner.note_mappings.len() != before
    }

    /// Snapshot of the CC mappings
    pub fn cc_mappings(&self) -> Vec<CcMapping> {
        self.inner.lock().unwrap().cc_mappings.clone()
    }

    /// Snapshot of the note mappings
    pub fn note_mappings(&self) -> Vec<NoteMapping> {
        self.inner.lock().unwrap().note_mappings.clone()
    }

    /// Replace the active mapping set wholesale from a preset
    pub fn apply_preset(&self, preset: &MappingPreset) {
        let mut inner = self.inner.lock().unwrap();
        inner.cc_mappings = preset.cc_mappings.clone();
        inner.note_mappings = preset.note_mappings.clone();
        for m in &mut inner.cc_mappings {
            m.ensure_id();
            m.last_value = 0.0;
            m.takeover_engaged = false;
        }
        for m in &mut inner.note_mappings {
            m.ensure_id();
        }
        inner.lsb_cache.clear();
        log::info!(
            "Map: Applied preset '{}' ({} cc, {} note mappings)",
            preset.name,
            inner.cc_mappings.len(),
            inner.note_mappings.len()
        );
    }

    /// Capture the active mapping set into a preset document
    pub fn to_preset(&self, name: &str, description: &str, author: &str, device_name: &str) -> MappingPreset {
        let inner = self.inner.lock().unwrap();
        MappingPreset {
            name: name.to_string(),
            description: description.to_string(),
            author: author.to_string(),
            device_name: device_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cc_mappings: inner.cc_mappings.clone(),
            note_mappings: inner.note_mappings.clone(),
        }
    }
}
