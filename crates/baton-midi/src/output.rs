//! MIDI output
//!
//! The protocol engines send feedback (LEDs, fader motors, displays) through
//! the `MidiSender` trait so tests can substitute a recording sink and the
//! engines never depend on a physical port being present.

use crate::event::MidiEvent;
use midir::MidiOutputConnection;

/// Outgoing MIDI seam
///
/// Implementations must never panic on a dead device: a disconnected control
/// surface must not interrupt the host. `false` means the message was not
/// delivered.
pub trait MidiSender {
    /// Send one channel-voice message
    fn send_event(&mut self, event: &MidiEvent) -> bool;

    /// Send a raw SysEx frame (including the F0/F7 framing bytes)
    ///
    /// Transports that cannot deliver SysEx return false; engines are
    /// expected to degrade gracefully (keep state in-model, skip the wire).
    fn send_sysex(&mut self, data: &[u8]) -> bool;
}

/// MIDI output handler over a midir connection
pub struct MidiOutputHandler {
    connection: MidiOutputConnection,
}

impl MidiOutputHandler {
    pub fn new(connection: MidiOutputConnection) -> Self {
        Self { connection }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> bool {
        match self.connection.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("MIDI output: Failed to send message: {}", e);
                false
            }
        }
    }
}

impl MidiSender for MidiOutputHandler {
    fn send_event(&mut self, event: &MidiEvent) -> bool {
        log::trace!("[MIDI OUT] {:?}", event);
        let bytes = event.to_bytes();
        self.send_bytes(&bytes)
    }

    fn send_sysex(&mut self, data: &[u8]) -> bool {
        log::trace!("[MIDI OUT] SysEx {} bytes", data.len());
        self.send_bytes(data)
    }
}
