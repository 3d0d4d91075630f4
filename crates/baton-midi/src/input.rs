//! MIDI input handling
//!
//! Receives raw MIDI bytes from the midir callback, parses them into
//! `MidiEvent`s, and bridges them to the host via a bounded flume channel.

use crate::connection::{MidiConnection, MidiConnectionError};
use crate::event::MidiEvent;
use flume::{Receiver, Sender};
use midir::MidiInputConnection;

/// Callback data passed to midir
struct CallbackData {
    event_tx: Sender<MidiEvent>,
}

/// MIDI input handler
///
/// Owns the midir connection; dropping the handler disconnects the port and
/// unregisters the callback, so close is inherently idempotent.
pub struct MidiInputHandler {
    /// The midir connection (kept alive for the duration)
    _connection: MidiInputConnection<CallbackData>,
    /// Receiver for parsed events
    event_rx: Receiver<MidiEvent>,
}

impl MidiInputHandler {
    /// Connect to the first MIDI input port matching `port_match`
    pub fn connect(port_match: &str) -> Result<Self, MidiConnectionError> {
        let (midi_in, port) = MidiConnection::find_input_port(port_match)?;
        Self::connect_port(midi_in, port)
    }

    /// Connect to a MIDI input port by device index
    pub fn connect_index(index: usize) -> Result<Self, MidiConnectionError> {
        let (midi_in, port) = MidiConnection::input_port_at(index)?;
        Self::connect_port(midi_in, port)
    }

    fn connect_port(
        midi_in: midir::MidiInput,
        port: midir::MidiInputPort,
    ) -> Result<Self, MidiConnectionError> {
        let (event_tx, event_rx) = flume::bounded(256);

        let connection = midi_in
            .connect(
                &port,
                "baton-midi-input",
                Self::midi_callback,
                CallbackData { event_tx },
            )
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Input handler connected");

        Ok(Self {
            _connection: connection,
            event_rx,
        })
    }

    /// The midir callback function
    ///
    /// Called from the MIDI driver thread whenever a message is received.
    /// Must be fast and non-blocking.
    fn midi_callback(_timestamp: u64, data: &[u8], callback_data: &mut CallbackData) {
        let event = match MidiEvent::parse(data) {
            Some(e) => e,
            None => return,
        };

        log::trace!("[MIDI IN] {:?}", event);

        if callback_data.event_tx.try_send(event).is_err() {
            log::warn!("MIDI: Event channel full, dropping message");
        }
    }

    /// Get the event receiver for manual polling or a dedicated thread
    pub fn events(&self) -> Receiver<MidiEvent> {
        self.event_rx.clone()
    }

    /// Try to receive a pending event (non-blocking)
    pub fn try_recv(&self) -> Option<MidiEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Drain all pending events
    pub fn drain(&self) -> impl Iterator<Item = MidiEvent> + '_ {
        std::iter::from_fn(|| self.try_recv())
    }
}
