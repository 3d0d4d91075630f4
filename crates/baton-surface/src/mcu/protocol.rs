//! MCU wire-format constants and primitive decode/encode helpers
//!
//! Note and CC numbers follow the Mackie Control Universal layout: per-strip
//! buttons occupy four consecutive 8-note banks, V-Pots rotate on CC 16-23
//! and light on CC 48-55, faders ride pitch bend per channel, and the LCD is
//! addressed by byte offset inside one SysEx frame.

use crate::events::TransportButton;

/// Strips per bank window
pub const STRIPS_PER_BANK: usize = 8;

// Per-strip button note banks (note = base + strip index)
pub const REC_ARM_BASE: u8 = 0;
pub const SOLO_BASE: u8 = 8;
pub const MUTE_BASE: u8 = 16;
pub const SELECT_BASE: u8 = 24;
pub const VPOT_PUSH_BASE: u8 = 32;
pub const FADER_TOUCH_BASE: u8 = 104;

// Navigation
pub const NOTE_BANK_LEFT: u8 = 46;
pub const NOTE_BANK_RIGHT: u8 = 47;
pub const NOTE_CHANNEL_LEFT: u8 = 48;
pub const NOTE_CHANNEL_RIGHT: u8 = 49;

// Transport row
pub const NOTE_CYCLE: u8 = 86;
pub const NOTE_CLICK: u8 = 89;
pub const NOTE_SOLO_DEFEAT: u8 = 90;
pub const NOTE_REWIND: u8 = 91;
pub const NOTE_FAST_FORWARD: u8 = 92;
pub const NOTE_STOP: u8 = 93;
pub const NOTE_PLAY: u8 = 94;
pub const NOTE_RECORD: u8 = 95;

/// V-Pot relative rotation arrives on CC 16-23
pub const VPOT_ROTATE_CC_BASE: u8 = 16;
/// V-Pot LED ring feedback goes out on CC 48-55
pub const VPOT_LED_CC_BASE: u8 = 48;

/// Pitch-bend channel carrying the master fader
pub const MASTER_FADER_CHANNEL: u8 = 8;

/// LCD SysEx frame: F0 00 00 66 14 12 <offset> <ascii bytes> F7
pub const SYSEX_DISPLAY_HEADER: [u8; 6] = [0xF0, 0x00, 0x00, 0x66, 0x14, 0x12];
pub const SYSEX_END: u8 = 0xF7;

/// Characters per strip on the top LCD row
pub const DISPLAY_CHARS_PER_STRIP: usize = 7;
/// Timecode field width
pub const TIMECODE_CHARS: usize = 10;
/// Byte offset of the timecode field, past the two 56-character LCD rows
pub const TIMECODE_OFFSET: u8 = 0x70;

/// Map a transport-row note to its button
pub fn transport_button(note: u8) -> Option<TransportButton> {
    match note {
        NOTE_REWIND => Some(TransportButton::Rewind),
        NOTE_FAST_FORWARD => Some(TransportButton::FastForward),
        NOTE_STOP => Some(TransportButton::Stop),
        NOTE_PLAY => Some(TransportButton::Play),
        NOTE_RECORD => Some(TransportButton::Record),
        NOTE_CYCLE => Some(TransportButton::Cycle),
        NOTE_CLICK => Some(TransportButton::Click),
        NOTE_SOLO_DEFEAT => Some(TransportButton::SoloDefeat),
        _ => None,
    }
}

/// Decode a V-Pot relative rotation byte
///
/// 1-15 is clockwise by that amount; 0x41-0x4F is counter-clockwise by
/// (value - 0x40). Anything else, including 0, decodes to no motion.
pub fn decode_vpot_delta(value: u8) -> i32 {
    match value {
        1..=15 => value as i32,
        0x41..=0x4F => -((value - 0x40) as i32),
        _ => 0,
    }
}

/// Pack a V-Pot LED ring byte: 3-bit mode, 4-bit position
pub fn encode_vpot_led(mode: u8, position: u8) -> u8 {
    ((mode & 0x07) << 4) | (position & 0x0F)
}

/// Build an LCD SysEx frame writing `width` characters at `offset`
///
/// Text is truncated or space-padded to the field width; non-ASCII bytes
/// are replaced with spaces to stay inside the 7-bit data range.
pub fn display_sysex(offset: u8, text: &str, width: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(SYSEX_DISPLAY_HEADER.len() + 2 + width);
    frame.extend_from_slice(&SYSEX_DISPLAY_HEADER);
    frame.push(offset & 0x7F);

    let mut chars = text.chars();
    for _ in 0..width {
        let byte = match chars.next() {
            Some(c) if c.is_ascii() && !c.is_ascii_control() => c as u8,
            Some(_) => b' ',
            None => b' ',
        };
        frame.push(byte);
    }

    frame.push(SYSEX_END);
    frame
}

/// Fit text into a fixed-width field (truncate or space-pad)
pub fn fit_field(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vpot_delta_clockwise() {
        assert_eq!(decode_vpot_delta(5), 5);
        assert_eq!(decode_vpot_delta(1), 1);
        assert_eq!(decode_vpot_delta(15), 15);
    }

    #[test]
    fn test_vpot_delta_counter_clockwise() {
        assert_eq!(decode_vpot_delta(0x45), -5);
        assert_eq!(decode_vpot_delta(0x41), -1);
        assert_eq!(decode_vpot_delta(0x4F), -15);
    }

    #[test]
    fn test_vpot_delta_boundaries() {
        // 0 must decode to no motion, not -64
        assert_eq!(decode_vpot_delta(0), 0);
        assert_eq!(decode_vpot_delta(0x40), 0);
        assert_eq!(decode_vpot_delta(16), 0);
        assert_eq!(decode_vpot_delta(0x50), 0);
    }

    #[test]
    fn test_transport_notes() {
        assert_eq!(transport_button(NOTE_PLAY), Some(TransportButton::Play));
        assert_eq!(transport_button(NOTE_STOP), Some(TransportButton::Stop));
        assert_eq!(transport_button(NOTE_CLICK), Some(TransportButton::Click));
        assert_eq!(transport_button(0), None);
        assert_eq!(transport_button(NOTE_BANK_LEFT), None);
    }

    #[test]
    fn test_encode_vpot_led_packs_fields() {
        assert_eq!(encode_vpot_led(1, 6), 0x16);
        assert_eq!(encode_vpot_led(3, 0x0F), 0x3F);
        // Out-of-range bits are masked off
        assert_eq!(encode_vpot_led(0xFF, 0xFF), 0x7F);
    }

    #[test]
    fn test_display_sysex_layout() {
        let frame = display_sysex(14, "Kick", 7);
        assert_eq!(&frame[..6], &SYSEX_DISPLAY_HEADER);
        assert_eq!(frame[6], 14);
        assert_eq!(&frame[7..14], b"Kick   ");
        assert_eq!(*frame.last().unwrap(), SYSEX_END);
    }

    #[test]
    fn test_display_sysex_truncates_and_sanitizes() {
        let frame = display_sysex(0, "Überlong name", 7);
        assert_eq!(frame.len(), 6 + 1 + 7 + 1);
        // Non-ASCII replaced by a space
        assert_eq!(frame[7], b' ');
        assert!(frame[7..14].iter().all(|b| *b < 0x80));
    }

    #[test]
    fn test_fit_field() {
        assert_eq!(fit_field("Kick", 7), "Kick   ");
        assert_eq!(fit_field("Overdrive", 7), "Overdri");
    }
}
