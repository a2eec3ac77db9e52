//! Text framing of the host <-> transceiver line protocol.
//!
//! The transceiver firmware (an IRLib2 sketch on a microcontroller) talks to
//! the host in short ASCII lines.
//!
//! # Device to host
//!
//! Every decoded IR command is reported as
//!
//! ```text
//! <HEX>,<PROTOCOL>,<BITS>\r\n        e.g.  E0E040BF,7,32
//! ```
//!
//! Command acknowledgements are free-form lines containing `250 OK`.
//!
//! # Host to device
//!
//! Commands are three comma-separated decimal fields followed by `\n`:
//!
//! | Opcode | p1          | p2                 | Meaning                 |
//! |--------|-------------|--------------------|-------------------------|
//! | `0`    | protocol id | value as decimal   | transmit a command      |
//! | `1`    | `1`         | `1` / `0`          | receiver on / off       |
//! | `1`    | `2`         | `1` / `0`          | receiver LED on / off   |
//! | `1`    | `3`         | `1` / `0`          | passive listen on / off |
//!
//! The bit width is not part of a transmit command; the firmware infers it
//! from the protocol.

use thiserror::Error;

use crate::domain::protocol::ProtocolId;
use crate::domain::signal::Signal;

/// Substring the firmware puts in every positive acknowledgement.
pub const ACK_MARKER: &str = "250 OK";

const OPCODE_TRANSMIT: u8 = 0;
const OPCODE_SETTING: u8 = 1;

/// Errors that can occur while parsing a device line or encoding a command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The line does not have the `<HEX>,<PROTOCOL>,<BITS>` shape.
    #[error("malformed signal frame: {0:?}")]
    Malformed(String),

    #[error("invalid {field} field in frame: {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// The command value is not hex or does not fit in 64 bits.
    #[error("signal value {0:?} is not a hex number of at most 64 bits")]
    InvalidHex(String),
}

/// Device settings addressable with opcode `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceSetting {
    Receiver = 1,
    ReceiverLed = 2,
    PassiveListen = 3,
}

/// A command sent from the host to the transceiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Emit the given signal.
    Transmit(Signal),
    /// Switch a device setting on or off.
    Set { setting: DeviceSetting, enabled: bool },
}

/// Parses one line reported by the device into a [`Signal`].
///
/// Trailing `\r` / `\n` are ignored.  Fields are trimmed; the hex value is
/// kept verbatim.
///
/// # Errors
///
/// [`FrameError::Malformed`] if the line does not have exactly three fields or
/// the value is empty, [`FrameError::InvalidField`] if the protocol or bit
/// width is not a decimal number.
pub fn parse_signal_frame(line: &str) -> Result<Signal, FrameError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields = line.split(',').map(str::trim);

    let (Some(value), Some(protocol), Some(bits), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(FrameError::Malformed(line.to_string()));
    };
    if value.is_empty() {
        return Err(FrameError::Malformed(line.to_string()));
    }

    let protocol: ProtocolId = protocol.parse().map_err(|_| FrameError::InvalidField {
        field: "protocol",
        value: protocol.to_string(),
    })?;
    let bits: u16 = bits.parse().map_err(|_| FrameError::InvalidField {
        field: "bits",
        value: bits.to_string(),
    })?;

    Ok(Signal::new(protocol, value, bits))
}

/// Encodes a command as one line, including the trailing `\n`.
///
/// # Errors
///
/// [`FrameError::InvalidHex`] if a transmit value cannot be converted to a
/// decimal number.
pub fn encode_command(command: &DeviceCommand) -> Result<String, FrameError> {
    match command {
        DeviceCommand::Transmit(signal) => {
            let decimal = hex_to_decimal(&signal.value)?;
            Ok(format!("{OPCODE_TRANSMIT},{},{decimal}\n", signal.protocol))
        }
        DeviceCommand::Set { setting, enabled } => Ok(format!(
            "{OPCODE_SETTING},{},{}\n",
            *setting as u8,
            u8::from(*enabled)
        )),
    }
}

/// Returns `true` if a device response line is a positive acknowledgement.
pub fn is_ack(response: &str) -> bool {
    response.contains(ACK_MARKER)
}

fn hex_to_decimal(value: &str) -> Result<u64, FrameError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return Err(FrameError::InvalidHex(value.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| FrameError::InvalidHex(value.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::protocol::{NEC, NECX, SONY};

    // ── parse_signal_frame ────────────────────────────────────────────────────

    #[test]
    fn test_parse_frame_with_crlf() {
        // Act
        let signal = parse_signal_frame("E0E040BF,7,32\r\n").unwrap();

        // Assert
        assert_eq!(signal.protocol, NECX);
        assert_eq!(signal.value, "E0E040BF");
        assert_eq!(signal.bits, 32);
    }

    #[test]
    fn test_parse_frame_keeps_value_text_verbatim() {
        let signal = parse_signal_frame("0a90,2,12").unwrap();
        assert_eq!(signal.value, "0a90");
        assert_eq!(signal.protocol, SONY);
    }

    #[test]
    fn test_parse_frame_with_missing_field_is_malformed() {
        assert_eq!(
            parse_signal_frame("E0E040BF,7\r\n"),
            Err(FrameError::Malformed("E0E040BF,7".to_string()))
        );
        assert!(matches!(parse_signal_frame("250 OK"), Err(FrameError::Malformed(_))));
        assert!(matches!(parse_signal_frame(",1,32"), Err(FrameError::Malformed(_))));
    }

    #[test]
    fn test_parse_frame_with_extra_field_is_malformed() {
        assert!(matches!(
            parse_signal_frame("E0E040BF,1,32,9"),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_frame_with_non_numeric_protocol() {
        let err = parse_signal_frame("E0E040BF,NEC,32").unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidField {
                field: "protocol",
                value: "NEC".to_string()
            }
        );
    }

    // ── encode_command ────────────────────────────────────────────────────────

    #[test]
    fn test_encode_transmit_converts_hex_to_decimal() {
        // Arrange
        let cmd = DeviceCommand::Transmit(Signal::new(NEC, "E0E040BF", 32));

        // Act
        let line = encode_command(&cmd).unwrap();

        // Assert
        assert_eq!(line, "0,1,3772793023\n");
    }

    #[test]
    fn test_encode_transmit_accepts_0x_prefix_and_full_width() {
        let cmd = DeviceCommand::Transmit(Signal::new(SONY, "0xFFFFFFFFFFFFFFFF", 64));
        assert_eq!(encode_command(&cmd).unwrap(), "0,2,18446744073709551615\n");
    }

    #[test]
    fn test_encode_transmit_rejects_non_hex_and_overflow() {
        let bad = DeviceCommand::Transmit(Signal::new(NEC, "XYZ", 32));
        assert_eq!(
            encode_command(&bad),
            Err(FrameError::InvalidHex("XYZ".to_string()))
        );

        let wide = DeviceCommand::Transmit(Signal::new(NEC, "1FFFFFFFFFFFFFFFF", 65));
        assert!(matches!(encode_command(&wide), Err(FrameError::InvalidHex(_))));
    }

    #[test]
    fn test_encode_settings() {
        let cases = [
            (DeviceSetting::Receiver, true, "1,1,1\n"),
            (DeviceSetting::Receiver, false, "1,1,0\n"),
            (DeviceSetting::ReceiverLed, true, "1,2,1\n"),
            (DeviceSetting::PassiveListen, false, "1,3,0\n"),
        ];
        for (setting, enabled, expected) in cases {
            let line = encode_command(&DeviceCommand::Set { setting, enabled }).unwrap();
            assert_eq!(line, expected);
        }
    }

    #[test]
    fn test_is_ack() {
        assert!(is_ack("250 OK\r\n"));
        assert!(is_ack("CMD 250 OK"));
        assert!(!is_ack("500 ERR"));
    }
}
