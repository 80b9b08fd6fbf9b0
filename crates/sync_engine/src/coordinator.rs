//! SyncCoordinator - role-parameterized facade over transport, liveness and phase.
//!
//! A driving node originates poses and play/reset events; a listening node
//! applies the ones its peer sends. Both share one periodic tick.

use contracts::{
    DataMessage, EventKind, HeartbeatRequest, HeartbeatResponse, Message, MessageKind,
    NodeConfig, Pose, PoseFrame, PoseSink, Role, SyncPhase, Vector3, DEFAULT_FRAME_TYPE,
};
use observability::SyncCounts;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use transport::{TransportError, UdpTransport};

use crate::liveness::{HeartbeatIdentity, LivenessMonitor, LivenessReport};
use crate::state::SyncStateMachine;

/// Buffered tick reports per subscriber
const TICK_REPORT_CAPACITY: usize = 16;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Node name (used in logs)
    pub name: String,
    pub role: Role,
    /// Tick / heartbeat period
    pub heartbeat_interval: Duration,
    /// Silence after which the peer counts as gone
    pub heartbeat_timeout: Duration,
    pub identity: HeartbeatIdentity,
    /// Last-known pose at startup
    pub initial_pose: Pose,
    /// Frame type of submitted poses
    pub frame_type: String,
    /// Answer peer heartbeats with our phase
    pub reply_to_heartbeats: bool,
    /// Send to the address/port the peer announces in its heartbeats
    pub follow_peer_heartbeat: bool,
}

impl CoordinatorConfig {
    /// Defaults: 1 s heartbeat, 5 s timeout, `unity` frame
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(5),
            identity: HeartbeatIdentity::default(),
            initial_pose: Pose::default(),
            frame_type: DEFAULT_FRAME_TYPE.to_string(),
            reply_to_heartbeats: false,
            follow_peer_heartbeat: false,
        }
    }

    /// Derive from a node entry of the blueprint
    pub fn from_node(node: &NodeConfig) -> Self {
        Self {
            name: node.name.clone(),
            role: node.role,
            heartbeat_interval: node.heartbeat.interval(),
            heartbeat_timeout: node.heartbeat.timeout(),
            identity: HeartbeatIdentity {
                sender_address: node.announced_address().to_string(),
                positioning_speed: node.session.positioning_speed,
                player: node.session.player.clone(),
                avatars: node.session.avatars.clone(),
            },
            initial_pose: node.session.initial_pose,
            frame_type: node.session.frame_type.clone(),
            reply_to_heartbeats: node.reply_to_heartbeats,
            follow_peer_heartbeat: node.follow_peer_heartbeat,
        }
    }
}

/// What the peer last told us about itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerStatus {
    /// `status` of the latest `heartbeat_response`
    pub last_status: Option<String>,
    /// Latest `heartbeat_request`
    pub last_heartbeat: Option<HeartbeatRequest>,
}

/// Peer update applied during a tick (listening role)
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedUpdate {
    Reset,
    Pose(PoseFrame),
    PlayStart,
}

/// Outcome of one coordinator tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub liveness: LivenessReport,
    /// Peer updates applied after the liveness check, in order
    pub applied: Vec<AppliedUpdate>,
    /// Phase at the end of the tick
    pub phase: SyncPhase,
}

struct Inner {
    config: CoordinatorConfig,
    transport: Arc<UdpTransport>,
    state: Arc<SyncStateMachine>,
    monitor: LivenessMonitor,
    pose: Mutex<PoseFrame>,
    peer: Mutex<PeerStatus>,
    sink: Mutex<Option<Arc<dyn PoseSink>>>,
    ticks: broadcast::Sender<TickReport>,
    poses_accepted: AtomicU64,
}

struct Ticker {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Sync coordinator
pub struct SyncCoordinator {
    inner: Arc<Inner>,
    ticker: tokio::sync::Mutex<Option<Ticker>>,
}

impl SyncCoordinator {
    /// Create a stopped coordinator in WAITING
    pub fn new(config: CoordinatorConfig, transport: Arc<UdpTransport>) -> Self {
        let state = Arc::new(SyncStateMachine::new(config.name.clone()));
        let monitor = LivenessMonitor::new(
            Arc::clone(&transport),
            Arc::clone(&state),
            config.identity.clone(),
            config.heartbeat_timeout,
        );
        let pose = PoseFrame::new(config.frame_type.clone(), config.initial_pose);
        let (ticks, _) = broadcast::channel(TICK_REPORT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state,
                monitor,
                pose: Mutex::new(pose),
                peer: Mutex::new(PeerStatus::default()),
                sink: Mutex::new(None),
                ticks,
                poses_accepted: AtomicU64::new(0),
            }),
            ticker: tokio::sync::Mutex::new(None),
        }
    }

    /// Attach a persistence sink for accepted poses
    pub fn with_pose_sink(self, sink: Arc<dyn PoseSink>) -> Self {
        *self.inner.sink_slot() = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn role(&self) -> Role {
        self.inner.config.role
    }

    pub fn transport(&self) -> &Arc<UdpTransport> {
        &self.inner.transport
    }

    /// Bound local address (None while stopped)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.local_addr()
    }

    /// Start the transport and the periodic tick
    ///
    /// Idempotent.
    #[instrument(
        name = "coordinator_start",
        skip(self),
        fields(node = %self.inner.config.name, role = %self.inner.config.role)
    )]
    pub async fn start_service(&self) -> Result<SocketAddr, TransportError> {
        let mut ticker = self.ticker.lock().await;
        let local_addr = self.inner.transport.start().await?;

        if ticker.is_none() {
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let handle = tokio::spawn(tick_loop(Arc::clone(&self.inner), shutdown_rx));
            *ticker = Some(Ticker {
                shutdown_tx,
                handle,
            });
            info!(
                node = %self.inner.config.name,
                role = %self.inner.config.role,
                interval_ms = self.inner.config.heartbeat_interval.as_millis() as u64,
                "Sync service started"
            );
        }

        Ok(local_addr)
    }

    /// Stop the tick, then the transport
    ///
    /// An in-flight tick completes first. The transport is stopped even if
    /// the tick task panicked. Buffered messages and the last receipt time
    /// are dropped, so after a restart the peer must be heard again before it
    /// counts as alive. The phase is kept until that first tick. Idempotent.
    #[instrument(name = "coordinator_stop", skip(self), fields(node = %self.inner.config.name))]
    pub async fn stop_service(&self) {
        let mut ticker = self.ticker.lock().await;

        if let Some(Ticker {
            shutdown_tx,
            handle,
        }) = ticker.take()
        {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                error!(node = %self.inner.config.name, error = ?e, "Tick task panicked");
            }
            info!(node = %self.inner.config.name, "Sync service stopped");
        }

        self.inner.transport.stop().await;
        self.inner.transport.reset();
    }

    /// Request PLAYING
    ///
    /// Driving: emits `play_start` and transitions. Listening: applies a
    /// buffered peer `reset` if there is one, otherwise a buffered `play_start`.
    pub fn request_play_start(&self) -> SyncPhase {
        let inner = &self.inner;
        match inner.config.role {
            Role::Driving => {
                inner.send_event(EventKind::PlayStart);
                inner.state.start_play()
            }
            Role::Listening => {
                if inner.transport.take(&MessageKind::Reset).is_some() {
                    inner.apply_reset()
                } else if inner.transport.take(&MessageKind::PlayStart).is_some() {
                    inner.state.start_play()
                } else {
                    inner.state.phase()
                }
            }
        }
    }

    /// Request WAITING
    ///
    /// Driving: emits `reset`, transitions and clears the receive buffer.
    /// Listening: does the same only for a buffered peer `reset`.
    pub fn request_reset(&self) -> SyncPhase {
        let inner = &self.inner;
        match inner.config.role {
            Role::Driving => {
                inner.send_event(EventKind::Reset);
                inner.apply_reset()
            }
            Role::Listening => {
                if inner.transport.take(&MessageKind::Reset).is_some() {
                    inner.apply_reset()
                } else {
                    inner.state.phase()
                }
            }
        }
    }

    /// Submit a local pose update
    ///
    /// Accepted only in POSITIONING. Driving nodes forward it to the peer;
    /// both roles cache and persist it. Returns whether it was accepted.
    pub fn submit_pose(&self, position: Vector3, orientation: Vector3) -> bool {
        let inner = &self.inner;
        let phase = inner.state.phase();
        if phase != SyncPhase::Positioning {
            debug!(node = %inner.config.name, phase = %phase, "Pose rejected outside POSITIONING");
            return false;
        }

        let frame = PoseFrame::new(
            inner.config.frame_type.clone(),
            Pose::new(position, orientation),
        );
        if inner.config.role == Role::Driving {
            inner
                .transport
                .send(&Message::Data(DataMessage::Position(frame.clone())));
        }
        inner.accept_pose(frame);
        true
    }

    pub fn current_phase(&self) -> SyncPhase {
        self.inner.state.phase()
    }

    /// Last accepted pose
    pub fn current_pose(&self) -> PoseFrame {
        self.inner.pose_slot().clone()
    }

    /// Liveness as of the last tick
    pub fn is_peer_alive(&self) -> bool {
        self.inner.monitor.is_alive()
    }

    pub fn peer_status(&self) -> PeerStatus {
        self.inner.peer_slot().clone()
    }

    /// Phase transitions and accepted poses since creation
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            transitions: self.inner.state.transition_count(),
            disconnects: self.inner.state.returns_to_waiting(),
            poses_accepted: self.inner.poses_accepted.load(Ordering::Relaxed),
        }
    }

    /// Receiver notified on every phase change
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.state.subscribe()
    }

    /// Receiver of every tick report
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickReport> {
        self.inner.ticks.subscribe()
    }

    /// Run one tick now
    pub fn tick(&self) -> TickReport {
        self.inner.tick_at(Instant::now())
    }

    /// Run one tick, judging liveness against `now`
    pub fn tick_at(&self, now: Instant) -> TickReport {
        self.inner.tick_at(now)
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.handle.abort();
        }
    }
}

impl Inner {
    fn pose_slot(&self) -> MutexGuard<'_, PoseFrame> {
        self.pose.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn peer_slot(&self) -> MutexGuard<'_, PeerStatus> {
        self.peer.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn sink_slot(&self) -> MutexGuard<'_, Option<Arc<dyn PoseSink>>> {
        self.sink.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn tick_at(&self, now: Instant) -> TickReport {
        let saved_pose = self.pose_slot().clone();
        let liveness = self.monitor.tick_at(now, &saved_pose);

        self.absorb_heartbeats();
        let applied = match self.config.role {
            Role::Listening => self.poll_peer_updates(),
            Role::Driving => Vec::new(),
        };

        let report = TickReport {
            liveness,
            applied,
            phase: self.state.phase(),
        };
        // No subscribers is fine
        let _ = self.ticks.send(report.clone());
        report
    }

    fn absorb_heartbeats(&self) {
        if let Some(Message::Data(DataMessage::HeartbeatResponse(response))) =
            self.transport.take(&MessageKind::HeartbeatResponse)
        {
            debug!(node = %self.config.name, status = %response.status, "Peer status");
            self.peer_slot().last_status = Some(response.status);
        }

        if let Some(Message::Data(DataMessage::HeartbeatRequest(heartbeat))) =
            self.transport.take(&MessageKind::HeartbeatRequest)
        {
            if self.config.follow_peer_heartbeat {
                self.follow(&heartbeat);
            }
            if self.config.reply_to_heartbeats {
                let status = HeartbeatResponse::new(self.state.phase().as_str());
                self.transport
                    .send(&Message::Data(DataMessage::HeartbeatResponse(status)));
            }
            self.peer_slot().last_heartbeat = Some(heartbeat);
        }
    }

    /// Point the transport at the peer's announced listen address
    fn follow(&self, heartbeat: &HeartbeatRequest) {
        if heartbeat.sender_listen_port == 0 {
            return;
        }
        let current = self.transport.destination();
        let ip = heartbeat
            .sender_address
            .parse::<IpAddr>()
            .ok()
            .filter(|ip| !ip.is_unspecified())
            .unwrap_or(current.ip());
        self.transport
            .set_destination(SocketAddr::new(ip, heartbeat.sender_listen_port));
    }

    /// Listening role: reset first, then pose, then play_start
    fn poll_peer_updates(&self) -> Vec<AppliedUpdate> {
        let mut applied = Vec::new();

        if self.transport.take(&MessageKind::Reset).is_some() {
            info!(node = %self.config.name, "Peer requested reset");
            self.apply_reset();
            applied.push(AppliedUpdate::Reset);
            return applied;
        }

        if self.state.phase() != SyncPhase::Positioning {
            return applied;
        }

        if let Some(Message::Data(DataMessage::Position(frame))) =
            self.transport.take(&MessageKind::Position)
        {
            self.accept_pose(frame.clone());
            applied.push(AppliedUpdate::Pose(frame));
        }

        if self.transport.take(&MessageKind::PlayStart).is_some() {
            info!(node = %self.config.name, "Peer requested play start");
            self.state.start_play();
            applied.push(AppliedUpdate::PlayStart);
        }

        applied
    }

    fn apply_reset(&self) -> SyncPhase {
        let phase = self.state.disconnect_or_reset();
        self.transport.reset();
        phase
    }

    fn send_event(&self, event: EventKind) {
        info!(node = %self.config.name, event = %event, "Sending event");
        self.transport.send(&Message::Event(event));
    }

    fn accept_pose(&self, frame: PoseFrame) {
        debug!(
            node = %self.config.name,
            x = frame.pose.position.x,
            y = frame.pose.position.y,
            z = frame.pose.position.z,
            "Pose accepted"
        );
        *self.pose_slot() = frame.clone();
        self.poses_accepted.fetch_add(1, Ordering::Relaxed);
        observability::record_pose_accepted();

        let sink = self.sink_slot().clone();
        if let Some(sink) = sink {
            if let Err(e) = sink.persist(&frame) {
                warn!(
                    node = %self.config.name,
                    sink = %sink.name(),
                    error = %e,
                    "Pose persistence failed"
                );
            }
        }
    }
}

/// Periodic tick task
#[instrument(name = "coordinator_tick_loop", skip(inner, shutdown_rx), fields(node = %inner.config.name))]
async fn tick_loop(inner: Arc<Inner>, mut shutdown_rx: oneshot::Receiver<()>) {
    let period = inner.config.heartbeat_interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => break,

            _ = interval.tick() => {
                inner.tick_at(Instant::now());
            }
        }
    }

    debug!(node = %inner.config.name, "Tick loop stopped");
}
