//! MessageKind - key of the latest-value table
//!
//! One key per data subtype or event subtype; unknown tags keep their string.

use std::fmt;

/// Message kind, as carried in `data_type` / `event_type`
///
/// # Examples
/// ```
/// use contracts::MessageKind;
///
/// let kind = MessageKind::from("play_start");
/// assert_eq!(kind, MessageKind::PlayStart);
/// assert_eq!(kind.as_str(), "play_start");
/// assert_eq!(MessageKind::from("calibrate"), MessageKind::Other("calibrate".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HeartbeatRequest,
    HeartbeatResponse,
    Position,
    PlayStart,
    Reset,
    /// Tag not known to this build
    Other(String),
}

impl MessageKind {
    pub const HEARTBEAT_REQUEST: &'static str = "heartbeat_request";
    pub const HEARTBEAT_RESPONSE: &'static str = "heartbeat_response";
    pub const POSITION: &'static str = "position";
    pub const PLAY_START: &'static str = "play_start";
    pub const RESET: &'static str = "reset";

    /// Wire tag of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::HeartbeatRequest => Self::HEARTBEAT_REQUEST,
            Self::HeartbeatResponse => Self::HEARTBEAT_RESPONSE,
            Self::Position => Self::POSITION,
            Self::PlayStart => Self::PLAY_START,
            Self::Reset => Self::RESET,
            Self::Other(tag) => tag,
        }
    }

    /// Whether this build knows the tag
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            Self::HEARTBEAT_REQUEST => Self::HeartbeatRequest,
            Self::HEARTBEAT_RESPONSE => Self::HeartbeatResponse,
            Self::POSITION => Self::Position,
            Self::PLAY_START => Self::PlayStart,
            Self::RESET => Self::Reset,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
