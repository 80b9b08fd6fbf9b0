//! BridgeBlueprint - Config Loader output
//!
//! Describes every bridge node hosted by one process: addressing, role,
//! heartbeat timing, the session identity announced to the peer and where
//! accepted poses are persisted.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Actor, Pose, PositioningSpeed, Role, DEFAULT_FRAME_TYPE};

/// Receive buffer size of the deployed peers
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1024;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// One entry per peer link
    pub nodes: Vec<NodeConfig>,
}

/// One bridge node: a transport, a coordinator and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique name (used in logs and metrics)
    pub name: String,

    pub role: Role,

    /// Local address the receive socket binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Local port the receive socket binds to
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Peer address; defaults to `bind_address`
    #[serde(default)]
    pub peer_address: Option<IpAddr>,

    /// Peer port; defaults to `listen_port`
    #[serde(default)]
    pub peer_port: Option<u16>,

    /// Address announced as `sender_address` in heartbeats; defaults to `bind_address`
    #[serde(default)]
    pub advertised_address: Option<IpAddr>,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    /// Answer peer heartbeats with a `heartbeat_response` carrying the local phase
    #[serde(default)]
    pub reply_to_heartbeats: bool,

    /// Redirect outgoing datagrams to the address/port announced in peer heartbeats
    #[serde(default)]
    pub follow_peer_heartbeat: bool,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Pose persistence (disabled when absent)
    #[serde(default)]
    pub persistence: Option<PersistenceConfig>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_listen_port() -> u16 {
    48528
}

fn default_max_datagram_size() -> usize {
    DEFAULT_MAX_DATAGRAM_SIZE
}

/// Heartbeat timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Tick period (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Peer is considered gone after this much silence (seconds)
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: f64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timeout_sec() -> f64 {
    5.0
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_sec: default_timeout_sec(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Timeout as a duration (non-finite or negative values clamp to zero)
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_sec).unwrap_or(Duration::ZERO)
    }
}

/// Identity and initial state announced to the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Frame type attached to outgoing poses
    #[serde(default = "default_frame_type")]
    pub frame_type: String,

    #[serde(default)]
    pub positioning_speed: PositioningSpeed,

    /// Last-known pose at startup
    #[serde(default)]
    pub initial_pose: Pose,

    #[serde(default)]
    pub player: Actor,

    #[serde(default)]
    pub avatars: Vec<Actor>,
}

fn default_frame_type() -> String {
    DEFAULT_FRAME_TYPE.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_type: default_frame_type(),
            positioning_speed: PositioningSpeed::default(),
            initial_pose: Pose::default(),
            player: Actor::default(),
            avatars: Vec::new(),
        }
    }
}

/// Where accepted poses are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub path: PathBuf,
}

impl NodeConfig {
    /// Local socket address
    pub fn bind_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.listen_port)
    }

    /// Peer socket address, falling back to the bind address / port
    pub fn peer_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.peer_address.unwrap_or(self.bind_address),
            self.peer_port.unwrap_or(self.listen_port),
        )
    }

    /// Address announced in heartbeats
    pub fn announced_address(&self) -> IpAddr {
        self.advertised_address.unwrap_or(self.bind_address)
    }

    /// Whether datagrams would be sent back to this node's own socket
    pub fn sends_to_self(&self) -> bool {
        self.peer_socket_addr() == self.bind_socket_addr()
    }
}
