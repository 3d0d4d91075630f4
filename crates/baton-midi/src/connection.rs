//! MIDI port discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS,
//! WinMM on Windows).

use midir::{MidiInput, MidiOutput, MidiOutputConnection};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// MIDI port discovery helpers
pub struct MidiConnection;

impl MidiConnection {
    /// Find a MIDI input port matching the given pattern
    ///
    /// The pattern is matched case-insensitively as a substring of port names.
    /// Returns the `MidiInput` handle and port so the caller can install its
    /// own callback.
    pub fn find_input_port(
        port_match: &str,
    ) -> Result<(MidiInput, midir::MidiInputPort), MidiConnectionError> {
        let pattern = port_match.to_lowercase();

        let midi_in = MidiInput::new("baton-midi-in")
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let in_ports = midi_in.ports();
        if in_ports.is_empty() {
            return Err(MidiConnectionError::NoInputPorts);
        }

        let input_port = in_ports
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiConnectionError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&input_port)
            .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;

        log::info!("MIDI: Found input port: {}", port_name);

        Ok((midi_in, input_port))
    }

    /// Find an input port by index, for hosts driving selection from a device list
    pub fn input_port_at(
        index: usize,
    ) -> Result<(MidiInput, midir::MidiInputPort), MidiConnectionError> {
        let midi_in = MidiInput::new("baton-midi-in")
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let mut in_ports = midi_in.ports();
        if in_ports.is_empty() {
            return Err(MidiConnectionError::NoInputPorts);
        }
        if index >= in_ports.len() {
            return Err(MidiConnectionError::PortNotFound(format!("index {}", index)));
        }

        Ok((midi_in, in_ports.swap_remove(index)))
    }

    /// Try to connect to a matching MIDI output port
    ///
    /// Best-effort: a surface without a writable output still works for input,
    /// so failures are logged and swallowed.
    pub fn connect_output(port_match: &str) -> Option<MidiOutputConnection> {
        let pattern = port_match.to_lowercase();

        let midi_out = match MidiOutput::new("baton-midi-out") {
            Ok(out) => out,
            Err(e) => {
                log::warn!("MIDI: Failed to initialize output: {}", e);
                return None;
            }
        };

        let out_ports = midi_out.ports();

        let output_port = out_ports.iter().find(|port| {
            midi_out
                .port_name(port)
                .map(|name| name.to_lowercase().contains(&pattern))
                .unwrap_or(false)
        })?;

        let port_name = midi_out.port_name(output_port).ok()?;
        log::info!("MIDI: Found output port: {}", port_name);

        match midi_out.connect(output_port, "baton-midi-output") {
            Ok(conn) => {
                log::info!("MIDI: Connected to output port");
                Some(conn)
            }
            Err(e) => {
                log::warn!("MIDI: Failed to connect to output: {}", e);
                None
            }
        }
    }

    /// List all available MIDI input ports
    ///
    /// The Vec index doubles as the device index for `input_port_at`.
    pub fn list_input_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_in = MidiInput::new("baton-midi-list")
            .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();

        Ok(ports)
    }

    /// List all available MIDI output ports
    pub fn list_output_ports() -> Result<Vec<String>, MidiConnectionError> {
        let midi_out = MidiOutput::new("baton-midi-list")
            .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;

        let ports: Vec<String> = midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();

        Ok(ports)
    }
}
