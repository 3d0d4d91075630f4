//! The MCU protocol engine
//!
//! Incoming messages arrive on the MIDI delivery thread; mixer refreshes
//! (`update_channel_state`) arrive on the host's UI tick. Both mutate the
//! strip array and write to the output port, so everything serializes under
//! one mutex, sends included, and multi-byte display frames never
//! interleave with an LED echo.

use crate::events::{EventSender, StripButtonKind, SurfaceEvent};
use crate::mcu::protocol::{self, STRIPS_PER_BANK};
use crate::mcu::strip::ChannelStrip;
use crate::mcu::{Protocol, VPotMode};
use baton_midi::{MidiEvent, MidiSender};
use flume::Receiver;
use std::sync::Mutex;

/// Fader motor deadband in 14-bit units; smaller refresh deltas are not sent
const FADER_DEADBAND: i32 = 100;

struct Inner {
    strips: [ChannelStrip; STRIPS_PER_BANK],
    bank: usize,
    total_tracks: usize,
    master_fader: u16,
    timecode: String,
    sender: Box<dyn MidiSender + Send>,
}

impl Inner {
    fn max_bank(&self) -> usize {
        if self.total_tracks <= STRIPS_PER_BANK {
            0
        } else {
            (self.total_tracks + STRIPS_PER_BANK - 1) / STRIPS_PER_BANK - 1
        }
    }

    fn send_led(&mut self, note: u8, on: bool) {
        self.sender.send_event(&MidiEvent::NoteOn {
            channel: 0,
            note,
            velocity: if on { 127 } else { 0 },
        });
    }

    /// Push one strip's full button-LED state to the surface
    fn send_strip_leds(&mut self, index: usize) {
        let (rec, solo, mute, sel) = {
            let s = &self.strips[index];
            (s.record_armed, s.soloed, s.muted, s.selected)
        };
        let i = index as u8;
        self.send_led(protocol::REC_ARM_BASE + i, rec);
        self.send_led(protocol::SOLO_BASE + i, solo);
        self.send_led(protocol::MUTE_BASE + i, mute);
        self.send_led(protocol::SELECT_BASE + i, sel);
    }

    fn send_display(&mut self, index: usize) {
        let text = protocol::fit_field(&self.strips[index].name, protocol::DISPLAY_CHARS_PER_STRIP);
        let offset = (index * protocol::DISPLAY_CHARS_PER_STRIP) as u8;
        let frame = protocol::display_sysex(offset, &text, protocol::DISPLAY_CHARS_PER_STRIP);
        if !self.sender.send_sysex(&frame) {
            // Display stays tracked in-model for hosts that render it themselves
            log::debug!("MCU: Transport rejected display SysEx for strip {}", index);
        }
    }

    fn switch_bank(&mut self, target: isize, events: &EventSender) {
        let clamped = target.clamp(0, self.max_bank() as isize) as usize;
        if clamped == self.bank {
            return;
        }
        self.bank = clamped;
        for i in 0..STRIPS_PER_BANK {
            self.strips[i].track_number = clamped * STRIPS_PER_BANK + i;
        }
        for i in 0..STRIPS_PER_BANK {
            self.send_strip_leds(i);
        }
        log::debug!("MCU: Bank switched to {}", clamped);
        events.emit(SurfaceEvent::BankChanged { bank: clamped });
    }
}

/// Mackie Control protocol engine over a banked 8-strip window
pub struct McuEngine {
    inner: Mutex<Inner>,
    events: EventSender,
}

impl McuEngine {
    /// Create an engine for `total_tracks` mixer channels
    ///
    /// Returns the engine and the event receiver the host drains.
    pub fn new(
        protocol: Protocol,
        total_tracks: usize,
        sender: Box<dyn MidiSender + Send>,
    ) -> (Self, Receiver<SurfaceEvent>) {
        if protocol == Protocol::Hui {
            log::warn!("MCU: HUI zone decoding is not implemented; using MCU message tables");
        }
        let (events, rx) = EventSender::channel();
        let engine = Self {
            inner: Mutex::new(Inner {
                strips: std::array::from_fn(ChannelStrip::new),
                bank: 0,
                total_tracks,
                master_fader: 0,
                timecode: String::new(),
                sender,
            }),
            events,
        };
        (engine, rx)
    }

    /// Decode one incoming MIDI message
    pub fn process_event(&self, event: &MidiEvent) {
        match *event {
            MidiEvent::NoteOn { note, velocity, .. } => self.handle_button(note, velocity > 0),
            MidiEvent::NoteOff { note, .. } => self.handle_button(note, false),
            MidiEvent::ControlChange { controller, value, .. } => {
                self.handle_cc(controller, value)
            }
            MidiEvent::PitchBend { channel, value } => self.handle_fader(channel, value),
        }
    }

    fn handle_button(&self, note: u8, pressed: bool) {
        let mut inner = self.inner.lock().unwrap();
        match note {
            n if n < protocol::SOLO_BASE => {
                let idx = (n - protocol::REC_ARM_BASE) as usize;
                if pressed {
                    let state = !inner.strips[idx].record_armed;
                    inner.strips[idx].record_armed = state;
                    inner.send_led(note, state);
                    self.events.emit(SurfaceEvent::StripButton {
                        channel: idx as u8,
                        kind: StripButtonKind::RecordArm,
                        active: state,
                    });
                }
            }
            n if n < protocol::MUTE_BASE => {
                let idx = (n - protocol::SOLO_BASE) as usize;
                if pressed {
                    let state = !inner.strips[idx].soloed;
                    inner.strips[idx].soloed = state;
                    inner.send_led(note, state);
                    self.events.emit(SurfaceEvent::StripButton {
                        channel: idx as u8,
                        kind: StripButtonKind::Solo,
                        active: state,
                    });
                }
            }
            n if n < protocol::SELECT_BASE => {
                let idx = (n - protocol::MUTE_BASE) as usize;
                if pressed {
                    let state = !inner.strips[idx].muted;
                    inner.strips[idx].muted = state;
                    inner.send_led(note, state);
                    self.events.emit(SurfaceEvent::StripButton {
                        channel: idx as u8,
                        kind: StripButtonKind::Mute,
                        active: state,
                    });
                }
            }
            n if n < protocol::VPOT_PUSH_BASE => {
                // Select is exclusive across the bank
                let idx = (n - protocol::SELECT_BASE) as usize;
                if pressed {
                    for i in 0..STRIPS_PER_BANK {
                        inner.strips[i].selected = i == idx;
                    }
                    for i in 0..STRIPS_PER_BANK {
                        let on = inner.strips[i].selected;
                        inner.send_led(protocol::SELECT_BASE + i as u8, on);
                    }
                    self.events.emit(SurfaceEvent::StripButton {
                        channel: idx as u8,
                        kind: StripButtonKind::Select,
                        active: true,
                    });
                }
            }
            n if (protocol::VPOT_PUSH_BASE..protocol::VPOT_PUSH_BASE + 8).contains(&n) => {
                self.events.emit(SurfaceEvent::VPot {
                    channel: n - protocol::VPOT_PUSH_BASE,
                    delta: 0,
                    pressed,
                });
            }
            n if (protocol::FADER_TOUCH_BASE..protocol::FADER_TOUCH_BASE + 8).contains(&n) => {
                let idx = (n - protocol::FADER_TOUCH_BASE) as usize;
                inner.strips[idx].touched = pressed;
                self.events.emit(SurfaceEvent::FaderMoved {
                    channel: idx as u8,
                    value: inner.strips[idx].fader,
                    touched: pressed,
                });
            }
            protocol::NOTE_BANK_LEFT | protocol::NOTE_CHANNEL_LEFT if pressed => {
                let target = inner.bank as isize - 1;
                inner.switch_bank(target, &self.events);
            }
            protocol::NOTE_BANK_RIGHT | protocol::NOTE_CHANNEL_RIGHT if pressed => {
                let target = inner.bank as isize + 1;
                inner.switch_bank(target, &self.events);
            }
            n => {
                if let Some(button) = protocol::transport_button(n) {
                    self.events.emit(SurfaceEvent::TransportButton { button, pressed });
                } else {
                    log::trace!("MCU: Ignoring note {}", n);
                }
            }
        }
    }

    fn handle_cc(&self, controller: u8, value: u8) {
        if !(protocol::VPOT_ROTATE_CC_BASE..protocol::VPOT_ROTATE_CC_BASE + 8)
            .contains(&controller)
        {
            log::trace!("MCU: Ignoring cc {}", controller);
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let idx = (controller - protocol::VPOT_ROTATE_CC_BASE) as usize;
        let delta = protocol::decode_vpot_delta(value);
        let pot = (inner.strips[idx].v_pot as i32 + delta).clamp(0, 127) as u8;
        inner.strips[idx].v_pot = pot;
        self.events.emit(SurfaceEvent::VPot {
            channel: idx as u8,
            delta,
            pressed: false,
        });
    }

    fn handle_fader(&self, channel: u8, value: u16) {
        let mut inner = self.inner.lock().unwrap();
        let value = value.min(16383);
        if (channel as usize) < STRIPS_PER_BANK {
            let idx = channel as usize;
            inner.strips[idx].fader = value;
            self.events.emit(SurfaceEvent::FaderMoved {
                channel,
                value,
                touched: inner.strips[idx].touched,
            });
        } else if channel == protocol::MASTER_FADER_CHANNEL {
            inner.master_fader = value;
            self.events.emit(SurfaceEvent::MasterFader { value });
        }
    }

    /// Move the bank window; out-of-range targets clamp
    pub fn switch_bank(&self, bank: isize) {
        let mut inner = self.inner.lock().unwrap();
        inner.switch_bank(bank, &self.events);
    }

    pub fn current_bank(&self) -> usize {
        self.inner.lock().unwrap().bank
    }

    pub fn bank_count(&self) -> usize {
        self.inner.lock().unwrap().max_bank() + 1
    }

    /// Snapshot of the strip array
    pub fn strips(&self) -> Vec<ChannelStrip> {
        self.inner.lock().unwrap().strips.to_vec()
    }

    /// Snapshot of one strip
    pub fn strip(&self, index: usize) -> Option<ChannelStrip> {
        self.inner.lock().unwrap().strips.get(index).cloned()
    }

    pub fn master_fader(&self) -> u16 {
        self.inner.lock().unwrap().master_fader
    }

    /// Send a button LED state (velocity 127 = on, 0 = off)
    pub fn send_led(&self, note: u8, on: bool) {
        self.inner.lock().unwrap().send_led(note, on);
    }

    /// Drive a fader motor; local state updates first so the surface's
    /// position echo is not mistaken for a user move
    pub fn set_fader_position(&self, channel: u8, value: u16) {
        let mut inner = self.inner.lock().unwrap();
        let value = value.min(16383);
        if (channel as usize) < STRIPS_PER_BANK {
            inner.strips[channel as usize].fader = value;
        } else if channel == protocol::MASTER_FADER_CHANNEL {
            inner.master_fader = value;
        }
        inner.sender.send_event(&MidiEvent::PitchBend { channel, value });
    }

    /// Light the V-Pot ring: display mode plus a 4-bit position
    pub fn set_vpot_led(&self, channel: u8, mode: VPotMode, position: u8) {
        let mut inner = self.inner.lock().unwrap();
        let data = protocol::encode_vpot_led(mode as u8, position);
        inner.sender.send_event(&MidiEvent::ControlChange {
            channel: 0,
            controller: protocol::VPOT_LED_CC_BASE + (channel & 0x07),
            value: data,
        });
    }

    /// Write a strip's 7-character display field
    ///
    /// The text is tracked in-model even when the transport cannot deliver
    /// SysEx, so hosts can render the virtual scribble strip.
    pub fn set_display_text(&self, channel: usize, text: &str) {
        if channel >= STRIPS_PER_BANK {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.strips[channel].name = text.to_string();
        inner.send_display(channel);
    }

    /// Write the 10-character timecode field
    pub fn set_timecode(&self, text: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.timecode = protocol::fit_field(text, protocol::TIMECODE_CHARS);
        let frame = protocol::display_sysex(
            protocol::TIMECODE_OFFSET,
            &inner.timecode,
            protocol::TIMECODE_CHARS,
        );
        if !inner.sender.send_sysex(&frame) {
            log::debug!("MCU: Transport rejected timecode SysEx");
        }
    }

    /// The tracked display text for a strip, fitted to the field width
    pub fn display_text(&self, channel: usize) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .strips
            .get(channel)
            .map(|s| protocol::fit_field(&s.name, protocol::DISPLAY_CHARS_PER_STRIP))
    }

    pub fn timecode(&self) -> String {
        self.inner.lock().unwrap().timecode.clone()
    }

    /// Bridge from the host's mixer model, called per channel per refresh tick
    ///
    /// `absolute_channel` is bank-independent; channels outside the current
    /// window are a no-op. Only changed state produces output.
    pub fn update_channel_state(
        &self,
        absolute_channel: usize,
        volume: f64,
        pan: f64,
        mute: bool,
        solo: bool,
        record_arm: bool,
        name: &str,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let base = inner.bank * STRIPS_PER_BANK;
        if absolute_channel < base || absolute_channel >= base + STRIPS_PER_BANK {
            return;
        }
        let idx = absolute_channel - base;

        // Fader motor: deadband, and never fight a touching hand
        let target = (volume.clamp(0.0, 1.0) * 16383.0).round() as u16;
        if !inner.strips[idx].touched
            && (target as i32 - inner.strips[idx].fader as i32).abs() > FADER_DEADBAND
        {
            inner.strips[idx].fader = target;
            inner.sender.send_event(&MidiEvent::PitchBend {
                channel: idx as u8,
                value: target,
            });
        }

        // Pan onto the V-Pot ring
        let pot = ((pan.clamp(-1.0, 1.0) + 1.0) * 63.5).round() as u8;
        if pot != inner.strips[idx].v_pot {
            inner.strips[idx].v_pot = pot;
            let data = protocol::encode_vpot_led(VPotMode::BoostCut as u8, pot >> 3);
            inner.sender.send_event(&MidiEvent::ControlChange {
                channel: 0,
                controller: protocol::VPOT_LED_CC_BASE + idx as u8,
                value: data,
            });
        }

        // Button LEDs only on change, not every tick
        if mute != inner.strips[idx].muted {
            inner.strips[idx].muted = mute;
            inner.send_led(protocol::MUTE_BASE + idx as u8, mute);
        }
        if solo != inner.strips[idx].soloed {
            inner.strips[idx].soloed = solo;
            inner.send_led(protocol::SOLO_BASE + idx as u8, solo);
        }
        if record_arm != inner.strips[idx].record_armed {
            inner.strips[idx].record_armed = record_arm;
            inner.send_led(protocol::REC_ARM_BASE + idx as u8, record_arm);
        }

        if name != inner.strips[idx].name {
            inner.strips[idx].name = name.to_string();
            inner.send_display(idx);
        }
    }
}
