//! Sync phase and node role

use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization phase
///
/// Exactly one phase is active per node. Displayed in upper case, which is
/// also the status string AR devices report in `heartbeat_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncPhase {
    /// No live peer
    #[default]
    Waiting,
    /// Peer alive, scene being aligned
    Positioning,
    /// Play in progress
    Playing,
}

impl SyncPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Positioning => "POSITIONING",
            Self::Playing => "PLAYING",
        }
    }

    /// Numeric code used for gauges
    pub const fn code(&self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Positioning => 1,
            Self::Playing => 2,
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the link a node plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Originates poses and play/reset events from local input
    #[serde(alias = "local")]
    Driving,
    /// Applies poses and events received from the peer, never re-emits them
    #[serde(alias = "device")]
    Listening,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Listening => "listening",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_displays_upper_case() {
        assert_eq!(SyncPhase::Positioning.to_string(), "POSITIONING");
        assert_eq!(SyncPhase::default(), SyncPhase::Waiting);
    }

    #[test]
    fn role_accepts_legacy_node_types() {
        let role: Role = serde_json::from_str(r#""device""#).unwrap();
        assert_eq!(role, Role::Listening);
        let role: Role = serde_json::from_str(r#""local""#).unwrap();
        assert_eq!(role, Role::Driving);
    }
}
