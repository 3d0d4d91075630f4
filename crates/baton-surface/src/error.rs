//! Contract-fault errors
//!
//! The only errors that surface to the caller are host-application bugs:
//! invalid mappings or empty identifiers handed to configuration methods.
//! Runtime/device conditions never raise; they degrade to log lines.

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Parameter id must not be empty")]
    EmptyParameterId,

    #[error("OSC address must not be empty")]
    EmptyAddress,

    #[error("MIDI channel out of range: {0} (expected -1 for omni or 0-15)")]
    ChannelOutOfRange(i8),

    #[error("Controller/note number out of range: {0} (expected 0-127)")]
    NumberOutOfRange(u8),
}
