//! Message - the unit exchanged with the peer
//!
//! Closed tagged union: typed data messages, fixed-vocabulary events, and an
//! untyped fallback for tags this build does not know.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Actor, ContractError, MessageKind, PoseFrame, PositioningSpeed};

/// Heartbeat payload schema written by this build
///
/// v1: address only; v2: + listen port, positioning speed, saved pose;
/// v3: + player, avatars.
pub const HEARTBEAT_SCHEMA_VERSION: u32 = 3;

/// Top-level message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `"type": "data"` with a recognized `data_type`
    Data(DataMessage),
    /// `"type": "event"` with a recognized `event_type`
    Event(EventKind),
    /// Anything else that was still a well-formed envelope
    Unrecognized(RawMessage),
}

impl Message {
    /// Build an event message, validating the tag
    ///
    /// # Errors
    /// `ContractError::ProtocolViolation` for tags other than `play_start` / `reset`.
    pub fn event(event_type: &str) -> Result<Self, ContractError> {
        event_type.parse().map(Self::Event)
    }

    /// Table key of this message
    ///
    /// `None` when the top-level type is neither `data` nor `event`, or the
    /// subtype tag is missing.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Data(data) => Some(data.kind()),
            Self::Event(event) => Some(event.kind()),
            Self::Unrecognized(raw) => raw.kind(),
        }
    }
}

impl From<DataMessage> for Message {
    fn from(data: DataMessage) -> Self {
        Self::Data(data)
    }
}

impl From<EventKind> for Message {
    fn from(event: EventKind) -> Self {
        Self::Event(event)
    }
}

/// Data messages with typed payloads
#[derive(Debug, Clone, PartialEq)]
pub enum DataMessage {
    HeartbeatRequest(HeartbeatRequest),
    HeartbeatResponse(HeartbeatResponse),
    Position(PoseFrame),
}

impl DataMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HeartbeatRequest(_) => MessageKind::HeartbeatRequest,
            Self::HeartbeatResponse(_) => MessageKind::HeartbeatResponse,
            Self::Position(_) => MessageKind::Position,
        }
    }
}

/// Lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayStart,
    Reset,
}

impl EventKind {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::PlayStart => MessageKind::PlayStart,
            Self::Reset => MessageKind::Reset,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlayStart => MessageKind::PLAY_START,
            Self::Reset => MessageKind::RESET,
        }
    }
}

impl FromStr for EventKind {
    type Err = ContractError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            MessageKind::PLAY_START => Ok(Self::PlayStart),
            MessageKind::RESET => Ok(Self::Reset),
            other => Err(ContractError::protocol_violation(other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `heartbeat_request` payload
///
/// Wire keys follow the deployed AR clients (`ip_address`, `server_udp_port`,
/// `saved_position`); the descriptive names are accepted on decode as well.
/// Everything but the address defaults, so older schema versions still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,

    #[serde(rename = "ip_address", alias = "sender_address")]
    pub sender_address: String,

    #[serde(rename = "server_udp_port", alias = "sender_listen_port", default)]
    pub sender_listen_port: u16,

    #[serde(default)]
    pub positioning_speed: PositioningSpeed,

    #[serde(rename = "saved_position", alias = "saved_pose", default)]
    pub saved_pose: PoseFrame,

    #[serde(default)]
    pub player: Actor,

    #[serde(default)]
    pub avatars: Vec<Actor>,
}

fn legacy_schema_version() -> u32 {
    1
}

/// `heartbeat_response` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: String,
}

impl HeartbeatResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Envelope of a message this build cannot type
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Top-level `type`
    pub message_type: String,
    pub data_type: Option<String>,
    pub event_type: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl RawMessage {
    pub const DATA: &'static str = "data";
    pub const EVENT: &'static str = "event";

    /// Key derived from the subtype matching the top-level type
    pub fn kind(&self) -> Option<MessageKind> {
        let tag = match self.message_type.as_str() {
            Self::DATA => self.data_type.as_deref(),
            Self::EVENT => self.event_type.as_deref(),
            _ => None,
        };
        tag.map(MessageKind::from)
    }
}
