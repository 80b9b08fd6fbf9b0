//! Liveness monitor: heartbeat out, receipt-recency in.

use contracts::{
    Actor, DataMessage, HeartbeatRequest, Message, PoseFrame, PositioningSpeed, SyncPhase,
    HEARTBEAT_SCHEMA_VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use transport::UdpTransport;

use crate::state::SyncStateMachine;

/// Identity announced in every heartbeat
#[derive(Debug, Clone, Default)]
pub struct HeartbeatIdentity {
    pub sender_address: String,
    pub positioning_speed: PositioningSpeed,
    pub player: Actor,
    pub avatars: Vec<Actor>,
}

/// Outcome of one liveness tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessReport {
    pub alive: bool,
    /// Phase before the tick
    pub previous: SyncPhase,
    /// Phase after the tick
    pub phase: SyncPhase,
    /// Time since the last received datagram (None = never)
    pub receipt_age: Option<Duration>,
}

impl LivenessReport {
    pub fn changed(&self) -> bool {
        self.previous != self.phase
    }
}

/// Sends heartbeats and drives connect/disconnect transitions
///
/// The peer counts as alive when any datagram arrived within `timeout`; the
/// heartbeat itself is only advisory.
pub struct LivenessMonitor {
    transport: Arc<UdpTransport>,
    state: Arc<SyncStateMachine>,
    identity: HeartbeatIdentity,
    timeout: Duration,
    alive: AtomicBool,
}

impl LivenessMonitor {
    pub fn new(
        transport: Arc<UdpTransport>,
        state: Arc<SyncStateMachine>,
        identity: HeartbeatIdentity,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            identity,
            timeout,
            alive: AtomicBool::new(false),
        }
    }

    /// Liveness as of the last tick
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One tick at the current time
    pub fn tick(&self, saved_pose: &PoseFrame) -> LivenessReport {
        self.tick_at(Instant::now(), saved_pose)
    }

    /// One tick, judging recency against `now`
    pub fn tick_at(&self, now: Instant, saved_pose: &PoseFrame) -> LivenessReport {
        self.transport.send(&self.heartbeat(saved_pose));

        let receipt_age = self
            .transport
            .last_receipt_time()
            .map(|at| now.saturating_duration_since(at));
        let alive = receipt_age.is_some_and(|age| age <= self.timeout);
        let was_alive = self.alive.swap(alive, Ordering::SeqCst);

        let previous = self.state.phase();
        let phase = if alive {
            if previous == SyncPhase::Waiting {
                self.state.connect_established()
            } else {
                previous
            }
        } else {
            let phase = self.state.disconnect_or_reset();
            // Lost session: its buffered poses and events must never be applied
            if previous != SyncPhase::Waiting {
                self.transport.reset();
            }
            phase
        };

        if alive != was_alive {
            info!(
                node = %self.transport.name(),
                alive,
                receipt_age_ms = receipt_age.map(|age| age.as_millis() as u64),
                "Peer liveness changed"
            );
        } else {
            debug!(node = %self.transport.name(), alive, phase = %phase, "Liveness tick");
        }
        observability::record_liveness(alive, receipt_age);

        LivenessReport {
            alive,
            previous,
            phase,
            receipt_age,
        }
    }

    fn heartbeat(&self, saved_pose: &PoseFrame) -> Message {
        let sender_listen_port = self
            .transport
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default();

        Message::Data(DataMessage::HeartbeatRequest(HeartbeatRequest {
            schema_version: HEARTBEAT_SCHEMA_VERSION,
            sender_address: self.identity.sender_address.clone(),
            sender_listen_port,
            positioning_speed: self.identity.positioning_speed,
            saved_pose: saved_pose.clone(),
            player: self.identity.player.clone(),
            avatars: self.identity.avatars.clone(),
        }))
    }
}
