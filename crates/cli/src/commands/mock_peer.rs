//! `mock-peer` command implementation.
//!
//! Runs a listening node that answers heartbeats and follows the driving
//! node's announced address, standing in for an AR headset.

use anyhow::{Context, Result};
use contracts::{
    HeartbeatConfig, NodeConfig, PersistenceConfig, Role, SessionConfig, DEFAULT_MAX_DATAGRAM_SIZE,
};
use std::time::Duration;
use tracing::{info, warn};

use super::run::setup_shutdown_signal;
use crate::bridge::{BridgeConfig, BridgeService};
use crate::cli::MockPeerArgs;

/// Execute the `mock-peer` command
pub async fn run_mock_peer(args: &MockPeerArgs) -> Result<()> {
    let node = mock_node(args);
    info!(
        bind = %node.bind_socket_addr(),
        peer = %node.peer_socket_addr(),
        "Starting mock AR peer"
    );

    let config = BridgeConfig {
        nodes: vec![node],
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: None,
        stdin_control: false,
    };
    let mut service = BridgeService::start(config)
        .await
        .context("Failed to start mock peer")?;

    for coordinator in service.coordinators() {
        if let Some(addr) = coordinator.local_addr() {
            println!("mock peer listening on {addr}");
        }
    }

    tokio::select! {
        _ = service.wait() => {}
        _ = setup_shutdown_signal() => {
            warn!("Received shutdown signal, stopping mock peer...");
        }
    }

    service.shutdown().await.print_summary();
    Ok(())
}

fn mock_node(args: &MockPeerArgs) -> NodeConfig {
    NodeConfig {
        name: "mock-peer".to_string(),
        role: Role::Listening,
        bind_address: args.bind.ip(),
        listen_port: args.bind.port(),
        peer_address: Some(args.peer.ip()),
        peer_port: Some(args.peer.port()),
        advertised_address: None,
        max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        reply_to_heartbeats: true,
        follow_peer_heartbeat: true,
        heartbeat: HeartbeatConfig {
            interval_ms: args.interval_ms.max(1),
            timeout_sec: args.timeout_sec,
        },
        session: SessionConfig::default(),
        persistence: args
            .persist
            .clone()
            .map(|path| PersistenceConfig { path }),
    }
}
