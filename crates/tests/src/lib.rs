//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 回环 UDP 上的 e2e 测试（无需 AR 设备）

#[cfg(test)]
mod contract_tests {
    use contracts::{DataMessage, EventKind, Message};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_wire_snapshot() {
        let bytes = transport::encode(&Message::Event(EventKind::PlayStart)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "event", "event_type": "play_start"})
        );

        let status = Message::Data(DataMessage::HeartbeatResponse(
            contracts::HeartbeatResponse::new("PLAYING"),
        ));
        let value: serde_json::Value =
            serde_json::from_slice(&transport::encode(&status).unwrap()).unwrap();
        assert_eq!(value["type"], "data");
        assert_eq!(value["data_type"], "heartbeat_response");
        assert_eq!(value["data"]["status"], "PLAYING");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        DataMessage, EventKind, Message, MessageKind, Pose, PoseFrame, Role, SyncPhase, Vector3,
    };
    use observability::{LinkSample, LinkStatsAggregator};
    use sync_engine::{CoordinatorConfig, SyncCoordinator};
    use tokio::net::UdpSocket;
    use tokio::sync::broadcast::error::TryRecvError;
    use transport::{TransportConfig, UdpTransport};

    const PLAY_START: &str = r#"{"type":"event","event_type":"play_start"}"#;
    const PEER_STATUS: &str =
        r#"{"type":"data","data_type":"heartbeat_response","data":{"status":"WAITING"}}"#;

    /// A coordinator wired to a raw UDP socket playing the peer
    struct Link {
        node: SyncCoordinator,
        peer: UdpSocket,
        local: SocketAddr,
    }

    /// Start a node whose periodic tick is effectively disabled; the tests
    /// drive ticks by hand.
    async fn link(role: Role) -> Link {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = Arc::new(UdpTransport::new(
            TransportConfig::new(
                "127.0.0.1:0".parse().unwrap(),
                Some(peer.local_addr().unwrap()),
            )
            .with_name(role.as_str()),
        ));
        let mut config = CoordinatorConfig::new(role.as_str(), role);
        config.heartbeat_interval = Duration::from_secs(3600);
        config.reply_to_heartbeats = true;

        let node = SyncCoordinator::new(config, transport);
        let mut ticks = node.subscribe_ticks();
        let local = node.start_service().await.unwrap();
        // The loop ticks once on start, then stays idle
        ticks.recv().await.unwrap();
        Link { node, peer, local }
    }

    impl Link {
        /// Send a raw datagram and wait until the node buffered it
        async fn send(&self, payload: &str) {
            let transport = self.node.transport();
            let before = transport.buffered_kinds();
            let stamp = transport.last_receipt_time();
            self.peer.send_to(payload.as_bytes(), self.local).await.unwrap();
            wait_until(|| {
                transport.buffered_kinds() > before || transport.last_receipt_time() != stamp
            })
            .await;
        }

        /// WAITING -> POSITIONING through a real datagram
        async fn connect(&self) {
            self.send(PEER_STATUS).await;
            assert_eq!(self.node.tick().phase, SyncPhase::Positioning);
        }

        /// Next decoded datagram that is not a heartbeat
        async fn next_message(&self) -> Option<Message> {
            let mut buf = [0u8; 1024];
            loop {
                let (len, _) = tokio::time::timeout(
                    Duration::from_millis(300),
                    self.peer.recv_from(&mut buf),
                )
                .await
                .ok()?
                .ok()?;
                let message = transport::decode(&buf[..len]).ok()?;
                if message.kind() != Some(MessageKind::HeartbeatRequest) {
                    return Some(message);
                }
            }
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Peer play_start while POSITIONING moves a listening node to PLAYING
    #[tokio::test]
    async fn test_e2e_peer_play_start() {
        let link = link(Role::Listening).await;
        link.connect().await;

        link.send(PLAY_START).await;
        let report = link.node.tick();

        assert_eq!(report.phase, SyncPhase::Playing);
        assert_eq!(link.node.current_phase(), SyncPhase::Playing);
        // Consumed by the tick
        assert_eq!(link.node.transport().take(&MessageKind::PlayStart), None);

        link.node.stop_service().await;
    }

    /// Silence beyond the timeout while PLAYING drops to WAITING and discards
    /// everything buffered from the lost session
    #[tokio::test]
    async fn test_e2e_silence_resets_session() {
        let link = link(Role::Driving).await;
        link.connect().await;
        assert_eq!(link.node.request_play_start(), SyncPhase::Playing);

        link.send(
            r#"{"type":"data","data_type":"position","data":{"frame_type":"unity",
                "position":{"x":9,"y":9,"z":9},"orientation":{"x":0,"y":0,"z":0}}}"#,
        )
        .await;

        let later = Instant::now() + Duration::from_secs(5) + Duration::from_secs(1);
        let report = link.node.tick_at(later);

        assert!(!report.liveness.alive);
        assert_eq!(report.liveness.previous, SyncPhase::Playing);
        assert_eq!(report.phase, SyncPhase::Waiting);
        assert_eq!(link.node.transport().take(&MessageKind::Position), None);
        assert_eq!(link.node.transport().buffered_kinds(), 0);

        link.node.stop_service().await;
    }

    /// Poses are only accepted while POSITIONING
    #[tokio::test]
    async fn test_e2e_pose_gated_by_phase() {
        let link = link(Role::Driving).await;
        let initial = link.node.current_pose();
        let position = Vector3::new(0.5, 1.0, -2.0);
        let orientation = Vector3::new(0.0, 30.0, 0.0);

        assert!(!link.node.submit_pose(position, orientation));
        assert_eq!(link.node.current_pose(), initial);
        assert_eq!(link.next_message().await, None);

        link.connect().await;
        assert!(link.node.submit_pose(position, orientation));

        let expected = PoseFrame::new("unity", Pose::new(position, orientation));
        assert_eq!(link.node.current_pose(), expected);
        assert_eq!(
            link.next_message().await,
            Some(Message::Data(DataMessage::Position(expected)))
        );

        link.node.stop_service().await;
    }

    /// An old client that only sends its address still keeps the link alive
    #[tokio::test]
    async fn test_e2e_legacy_heartbeat() {
        let link = link(Role::Listening).await;
        link.send(r#"{"type":"data","data_type":"heartbeat_request","data":{"ip_address":"127.0.0.1"}}"#)
            .await;

        assert_eq!(link.node.tick().phase, SyncPhase::Positioning);

        let heartbeat = link.node.peer_status().last_heartbeat.unwrap();
        assert_eq!(heartbeat.schema_version, 1);
        assert_eq!(heartbeat.sender_listen_port, 0);
        assert_eq!(heartbeat.saved_pose, PoseFrame::default());

        match link.next_message().await {
            Some(Message::Data(DataMessage::HeartbeatResponse(response))) => {
                assert_eq!(response.status, "POSITIONING");
            }
            other => panic!("expected heartbeat response, got {other:?}"),
        }

        link.node.stop_service().await;
    }

    /// Reset from the peer wins over a play_start buffered before it
    #[tokio::test]
    async fn test_e2e_reset_wins_over_play_start() {
        let link = link(Role::Listening).await;
        link.connect().await;

        link.send(PLAY_START).await;
        link.send(r#"{"type":"event","event_type":"reset"}"#).await;

        let report = link.node.tick();
        assert_eq!(report.phase, SyncPhase::Waiting);
        assert_eq!(report.applied, vec![sync_engine::AppliedUpdate::Reset]);
        assert_eq!(link.node.transport().take(&MessageKind::PlayStart), None);

        link.node.stop_service().await;
    }

    #[tokio::test]
    async fn test_e2e_restart_rebinds_same_port() {
        let link = link(Role::Driving).await;
        link.node.stop_service().await;
        assert_eq!(link.node.local_addr(), None);

        let again = link.node.start_service().await.unwrap();
        assert_eq!(again, link.local);

        link.send(PEER_STATUS).await;
        assert!(link.node.tick().liveness.alive);

        link.node.stop_service().await;
    }

    /// Two distinct free loopback ports (released before use)
    fn free_ports() -> (u16, u16) {
        let a = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let b = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        (a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
    }

    /// Driving and listening nodes built from one configuration talk to each
    /// other through a full positioning -> play -> reset cycle
    #[tokio::test]
    async fn test_e2e_configured_pair() {
        let (controller_port, headset_port) = free_ports();
        let config = format!(
            r#"
[[nodes]]
name = "controller"
role = "driving"
bind_address = "127.0.0.1"
listen_port = {controller_port}
peer_address = "127.0.0.1"
peer_port = {headset_port}
[nodes.heartbeat]
interval_ms = 20
timeout_sec = 1.0
[nodes.session]
player = {{ type = "drone", name = "Drone" }}

[[nodes]]
name = "headset"
role = "device"
bind_address = "127.0.0.1"
listen_port = {headset_port}
peer_address = "127.0.0.1"
peer_port = 9
reply_to_heartbeats = true
follow_peer_heartbeat = true
[nodes.heartbeat]
interval_ms = 20
timeout_sec = 1.0
"#
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();

        let mut nodes = Vec::new();
        for node in &blueprint.nodes {
            let transport = Arc::new(UdpTransport::new(TransportConfig::from_node(node)));
            nodes.push(SyncCoordinator::new(
                CoordinatorConfig::from_node(node),
                transport,
            ));
        }
        let (controller, headset) = (&nodes[0], &nodes[1]);
        assert_eq!(headset.role(), Role::Listening);

        let mut ticks = headset.subscribe_ticks();
        let mut headset_phase = headset.subscribe_phase();
        controller.start_service().await.unwrap();
        headset.start_service().await.unwrap();

        // The headset learns where the controller listens from its heartbeats
        wait_until(|| {
            controller.current_phase() == SyncPhase::Positioning
                && headset.current_phase() == SyncPhase::Positioning
        })
        .await;
        assert_eq!(headset.transport().destination().port(), controller_port);
        let announced = headset.peer_status().last_heartbeat.unwrap();
        assert_eq!(announced.player.name, "Drone");

        // Pose travels controller -> headset
        let position = Vector3::new(1.0, 0.0, 2.0);
        let orientation = Vector3::new(0.0, 45.0, 0.0);
        assert!(controller.submit_pose(position, orientation));
        wait_until(|| headset.current_pose().pose.position == position).await;

        // Play
        assert_eq!(controller.request_play_start(), SyncPhase::Playing);
        wait_until(|| headset.current_phase() == SyncPhase::Playing).await;
        wait_until(|| controller.peer_status().last_status.as_deref() == Some("PLAYING")).await;

        // Reset sends the headset back through WAITING
        controller.request_reset();
        tokio::time::timeout(
            Duration::from_secs(3),
            headset_phase.wait_for(|phase| *phase == SyncPhase::Waiting),
        )
        .await
        .expect("headset never reset")
        .unwrap();

        controller.stop_service().await;
        headset.stop_service().await;

        let mut stats = LinkStatsAggregator::new();
        loop {
            match ticks.try_recv() {
                Ok(report) => stats.update(&LinkSample {
                    alive: report.liveness.alive,
                    phase: report.phase,
                    receipt_age: report.liveness.receipt_age,
                }),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        stats.record_counts(headset.counts());
        let summary = stats.summary();
        assert!(summary.total_ticks > 0);
        assert!(summary.alive_ticks > 0);
        assert_eq!(summary.poses_accepted, 1);
        assert!(summary.transitions >= 3, "{summary:?}");
        assert_eq!(controller.counts().poses_accepted, 1);
    }

    /// Driving play and reset reach the peer as events
    #[tokio::test]
    async fn test_e2e_driving_events_on_the_wire() {
        let link = link(Role::Driving).await;
        link.connect().await;

        link.node.request_play_start();
        assert_eq!(
            link.next_message().await,
            Some(Message::Event(EventKind::PlayStart))
        );
        link.node.request_reset();
        assert_eq!(
            link.next_message().await,
            Some(Message::Event(EventKind::Reset))
        );

        link.node.stop_service().await;
    }
}
