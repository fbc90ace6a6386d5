//! JSON wire types exchanged with the WebSocket server.
//!
//! Outbound: `spectral_data` frames carrying all 18 named channels, and
//! free-form `status` messages. Inbound: `command` messages whose `action`
//! maps to a [`Command`]. Unknown message types and unknown actions are
//! ignored rather than treated as errors; extra fields (the server attaches
//! timestamps) are tolerated.

use serde::{Deserialize, Serialize};

use crate::as7265x::channels::{CHANNEL_COUNT, CHANNELS};

/// Remote commands the node accepts, mirroring the server's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Trigger a measurement and publish the result.
    ReadSensor,
    /// Raise log verbosity.
    DebugOn,
    /// Restore normal log verbosity.
    DebugOff,
}

#[derive(Serialize)]
struct ChannelReading {
    name: &'static str,
    wavelength_nm: u16,
    value: f32,
}

#[derive(Serialize)]
struct SpectralData {
    #[serde(rename = "type")]
    msg_type: &'static str,
    channels: [ChannelReading; CHANNEL_COUNT],
}

#[derive(Serialize)]
struct StatusMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    message: &'a str,
}

#[derive(Deserialize)]
struct Inbound<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    #[serde(borrow)]
    action: Option<&'a str>,
}

/// Serializes an 18-channel frame into `buf`, pairing each value with its
/// band name and wavelength from the channel table. Returns the encoded
/// length.
pub fn encode_spectral_data(
    values: &[f32; CHANNEL_COUNT],
    buf: &mut [u8],
) -> Result<usize, serde_json_core::ser::Error> {
    let msg = SpectralData {
        msg_type: "spectral_data",
        channels: core::array::from_fn(|i| ChannelReading {
            name: CHANNELS[i].name,
            wavelength_nm: CHANNELS[i].wavelength_nm,
            value: values[i],
        }),
    };
    serde_json_core::to_slice(&msg, buf)
}

/// Serializes a status message into `buf`. Returns the encoded length.
pub fn encode_status(message: &str, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
    let msg = StatusMessage {
        msg_type: "status",
        message,
    };
    serde_json_core::to_slice(&msg, buf)
}

/// Parses an inbound payload. `None` for anything that is not a known
/// command: malformed JSON, other message types, unknown actions.
pub fn decode_command(payload: &[u8]) -> Option<Command> {
    let (inbound, _) = serde_json_core::from_slice::<Inbound<'_>>(payload).ok()?;
    if inbound.msg_type != "command" {
        return None;
    }
    match inbound.action? {
        "read_sensor" => Some(Command::ReadSensor),
        "debug_on" => Some(Command::DebugOn),
        "debug_off" => Some(Command::DebugOff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectral_data_carries_all_channels_in_order() {
        let mut values = [0.0f32; CHANNEL_COUNT];
        values[0] = 12.5;
        let mut buf = [0u8; 2048];
        let len = encode_spectral_data(&values, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();

        assert!(json.starts_with(
            "{\"type\":\"spectral_data\",\"channels\":[{\"name\":\"R\",\"wavelength_nm\":610,\"value\":12.5}"
        ));
        assert!(json.ends_with("]}"));
        assert_eq!(json.matches("\"name\"").count(), CHANNEL_COUNT);
        // Device-major order: NIR die first, UV die last.
        assert!(json.find("\"R\"").unwrap() < json.find("\"G\"").unwrap());
        assert!(json.find("\"G\"").unwrap() < json.find("\"A\"").unwrap());
    }

    #[test]
    fn status_message_shape() {
        let mut buf = [0u8; 128];
        let len = encode_status("spectral node online", &mut buf).unwrap();
        assert_eq!(
            core::str::from_utf8(&buf[..len]).unwrap(),
            "{\"type\":\"status\",\"message\":\"spectral node online\"}"
        );
    }

    #[test]
    fn command_decodes_with_extra_fields() {
        let payload =
            br#"{"type":"command","action":"read_sensor","timestamp":"2025-01-01T00:00:00"}"#;
        assert_eq!(decode_command(payload), Some(Command::ReadSensor));
    }

    #[test]
    fn debug_toggles_decode() {
        assert_eq!(
            decode_command(br#"{"type":"command","action":"debug_on"}"#),
            Some(Command::DebugOn)
        );
        assert_eq!(
            decode_command(br#"{"type":"command","action":"debug_off"}"#),
            Some(Command::DebugOff)
        );
    }

    #[test]
    fn non_commands_are_ignored() {
        assert_eq!(decode_command(br#"{"type":"ack","status":"received"}"#), None);
        assert_eq!(
            decode_command(br#"{"type":"command","action":"format_flash"}"#),
            None
        );
        assert_eq!(decode_command(br#"{"type":"command"}"#), None);
        assert_eq!(decode_command(b"not json"), None);
    }
}
