//! Command envelopes and wire format for the MFD lighting control gateway.
//!
//! This crate is intentionally lightweight (`serde`, `serde_json`, `thiserror`).
//! It defines:
//! - Message type / command tags used by the device
//! - The `Envelope` wire type and its JSON encoding
//! - Builders for every outbound command the panel sends
//! - A closed `Inbound` classification for dispatching received envelopes

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Message tags ───────────────────────────────────────────────────

/// Message category (`messagetype` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Status report pushed by the device
    Status = 16,
    /// Control command (momentary, dimmer)
    Control = 17,
    ChannelInfo = 32,
    ChannelCmd = 33,
    SystemCmd = 48,
    SystemReq = 49,
    SystemWrite = 50,
    SubscriptionRequest = 96,
    Acknowledgement = 128,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            16 => Some(Self::Status),
            17 => Some(Self::Control),
            32 => Some(Self::ChannelInfo),
            33 => Some(Self::ChannelCmd),
            48 => Some(Self::SystemCmd),
            49 => Some(Self::SystemReq),
            50 => Some(Self::SystemWrite),
            96 => Some(Self::SubscriptionRequest),
            128 => Some(Self::Acknowledgement),
            _ => None,
        }
    }
}

/// Commands scoped to `SystemCmd` / `SystemReq`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemCommand {
    DeviceInfo = 1,
    Heartbeat = 5,
}

impl SystemCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::DeviceInfo),
            5 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// Commands scoped to `Control` / `ChannelCmd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelCommand {
    Toggle = 0,
    Momentary = 1,
    DimmerUpdate = 3,
    StatusUpdate = 5,
}

impl ChannelCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Toggle),
            1 => Some(Self::Momentary),
            3 => Some(Self::DimmerUpdate),
            5 => Some(Self::StatusUpdate),
            _ => None,
        }
    }
}

/// Commands scoped to `Acknowledgement`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcknowledgementCommand {
    Ack = 0,
}

/// Highest dimmer level the device accepts
pub const DIMMER_MAX: i32 = 1000;

/// Status byte sent in front of a dimmer level (0 = on)
pub const DIMMER_STATUS_ON: u8 = 0;

// ── Envelope ───────────────────────────────────────────────────────

/// One protocol message unit.
///
/// Wire form: `{"messagetype":17,"messagecmd":1,"size":3,"data":[5,0,1]}`.
/// Outbound envelopes always satisfy `data.len() == size`. Inbound envelopes
/// are taken as-is, so payload readers must bounds-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "messagetype")]
    pub message_type: u8,
    #[serde(rename = "messagecmd")]
    pub message_cmd: u8,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size: u16,
    #[serde(default, deserialize_with = "lenient_bytes")]
    pub data: Vec<u8>,
}

/// `size` is informational: anything that is not a number reads as 0.
fn lenient_size<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().map_or(0, |n| n.min(u16::MAX as u64) as u16))
}

/// A payload that is `null` or not an array reads as empty. Entries keep
/// their low byte; non-numeric entries read as 0.
fn lenient_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().map(payload_byte).collect(),
        _ => Vec::new(),
    })
}

fn payload_byte(item: &Value) -> u8 {
    match item.as_i64() {
        Some(n) => n as u8,
        None => item.as_f64().map_or(0, |f| f as i64 as u8),
    }
}

impl Envelope {
    /// Build an envelope whose declared size matches its payload.
    pub fn new(message_type: MessageType, message_cmd: u8, data: Vec<u8>) -> Self {
        Self {
            message_type: message_type as u8,
            message_cmd,
            size: data.len() as u16,
            data,
        }
    }

    /// Payload byte at `index`, if present.
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Little-endian u16 starting at `index`, if both bytes are present.
    pub fn u16_le(&self, index: usize) -> Option<u16> {
        Some(u16::from_le_bytes([self.byte(index)?, self.byte(index + 1)?]))
    }

    /// Sort this envelope into one of the kinds the panel understands.
    pub fn classify(&self) -> Inbound {
        let message_type = self.message_type;
        let message_cmd = self.message_cmd;

        match (MessageType::from_byte(message_type), message_cmd) {
            (Some(MessageType::SystemCmd), cmd)
                if SystemCommand::from_byte(cmd) == Some(SystemCommand::Heartbeat) =>
            {
                Inbound::Heartbeat
            }
            (Some(MessageType::Status), 0 | 1) => match (self.u16_le(0), self.byte(2)) {
                (Some(signal_id), Some(state)) => Inbound::StatusReport { signal_id, state },
                _ => Inbound::Truncated {
                    message_type,
                    message_cmd,
                    len: self.data.len(),
                },
            },
            _ => Inbound::Unhandled {
                message_type,
                message_cmd,
            },
        }
    }
}

/// Closed set of inbound envelope kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Device heartbeat (`48/5`), must be acknowledged
    Heartbeat,
    /// Signal status push (`16/0` or `16/1`)
    StatusReport { signal_id: u16, state: u8 },
    /// A status report whose payload is too short to read
    Truncated {
        message_type: u8,
        message_cmd: u8,
        len: usize,
    },
    /// Anything the panel does not act on
    Unhandled { message_type: u8, message_cmd: u8 },
}

// ── Encoding / decoding ────────────────────────────────────────────

/// Inbound text that is not a well-formed envelope
#[derive(Debug, Error)]
#[error("malformed envelope: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Parse wire text into an envelope.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Render an envelope as wire text.
pub fn serialize(envelope: &Envelope) -> String {
    // A struct of integers and a byte vector cannot fail to serialize.
    serde_json::to_string(envelope).unwrap_or_default()
}

/// Split a channel id into its (low, high) wire bytes.
pub fn channel_bytes(channel_id: u16) -> [u8; 2] {
    channel_id.to_le_bytes()
}

/// Clamp a requested dimmer level into the range the device accepts.
pub fn clamp_level(level: i32) -> u16 {
    level.clamp(0, DIMMER_MAX) as u16
}

/// Acknowledgement for a received heartbeat: `{128,0,1,[0]}`
pub fn heartbeat_ack() -> Envelope {
    Envelope::new(
        MessageType::Acknowledgement,
        AcknowledgementCommand::Ack as u8,
        vec![0],
    )
}

/// Device info request, also used as the watchdog probe: `{49,1,3,[0,0,0]}`
pub fn device_info_request() -> Envelope {
    Envelope::new(
        MessageType::SystemReq,
        SystemCommand::DeviceInfo as u8,
        vec![0, 0, 0],
    )
}

/// Press (`active = true`) or release a momentary channel.
pub fn momentary(channel_id: u16, active: bool) -> Envelope {
    let [lo, hi] = channel_bytes(channel_id);
    Envelope::new(
        MessageType::Control,
        ChannelCommand::Momentary as u8,
        vec![lo, hi, u8::from(active)],
    )
}

/// Set a dimmer channel level. Out-of-range levels are clamped, never rejected.
pub fn dimmer(channel_id: u16, level: i32) -> Envelope {
    let [lo, hi] = channel_bytes(channel_id);
    let [level_lo, level_hi] = clamp_level(level).to_le_bytes();
    Envelope::new(
        MessageType::Control,
        ChannelCommand::DimmerUpdate as u8,
        vec![lo, hi, DIMMER_STATUS_ON, level_lo, level_hi],
    )
}

// ── Subscription bootstrap ─────────────────────────────────────────

/// Number of signals a subscription blob asks for (two id bytes per signal).
///
/// The blob itself is sent verbatim; this is only used for reporting.
pub fn subscription_signal_count(blob: &str) -> Result<usize, DecodeError> {
    Ok(decode(blob)?.data.len() / 2)
}
