//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeBlueprint, NodeConfig, Vector3};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    nodes: Vec<NodeInfo>,
}

#[derive(Serialize)]
struct NodeInfo {
    name: String,
    role: String,
    bind: String,
    destination: String,
    announced_address: String,
    heartbeat_interval_ms: u64,
    heartbeat_timeout_sec: f64,
    max_datagram_size: usize,
    reply_to_heartbeats: bool,
    follow_peer_heartbeat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pose_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionInfo>,
}

#[derive(Serialize)]
struct SessionInfo {
    frame_type: String,
    player: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    avatars: Vec<String>,
    positioning_speed: [f64; 2],
    initial_position: [f64; 3],
    initial_orientation: [f64; 3],
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args.session);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args.session);
    }

    Ok(())
}

fn build_config_info(blueprint: &BridgeBlueprint, with_session: bool) -> ConfigInfo {
    let nodes = blueprint
        .nodes
        .iter()
        .map(|node| NodeInfo {
            name: node.name.clone(),
            role: node.role.to_string(),
            bind: node.bind_socket_addr().to_string(),
            destination: node.peer_socket_addr().to_string(),
            announced_address: node.announced_address().to_string(),
            heartbeat_interval_ms: node.heartbeat.interval_ms,
            heartbeat_timeout_sec: node.heartbeat.timeout_sec,
            max_datagram_size: node.max_datagram_size,
            reply_to_heartbeats: node.reply_to_heartbeats,
            follow_peer_heartbeat: node.follow_peer_heartbeat,
            pose_file: node
                .persistence
                .as_ref()
                .map(|p| p.path.display().to_string()),
            session: with_session.then(|| session_info(node)),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        nodes,
    }
}

fn session_info(node: &NodeConfig) -> SessionInfo {
    let session = &node.session;
    let xyz = |v: Vector3| [v.x, v.y, v.z];
    SessionInfo {
        frame_type: session.frame_type.clone(),
        player: describe_actor(&session.player.kind, &session.player.name),
        avatars: session
            .avatars
            .iter()
            .map(|a| describe_actor(&a.kind, &a.name))
            .collect(),
        positioning_speed: [
            session.positioning_speed.position,
            session.positioning_speed.rotation,
        ],
        initial_position: xyz(session.initial_pose.position),
        initial_orientation: xyz(session.initial_pose.orientation),
    }
}

fn describe_actor(kind: &str, name: &str) -> String {
    match (kind.is_empty(), name.is_empty()) {
        (true, true) => "-".to_string(),
        (false, true) => kind.to_string(),
        (true, false) => name.to_string(),
        (false, false) => format!("{name} ({kind})"),
    }
}

fn print_config_info(blueprint: &BridgeBlueprint, with_session: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  AR Bridge Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Version: {:?}", blueprint.version);

    println!("\n📡 Nodes ({})", blueprint.nodes.len());
    for (i, node) in blueprint.nodes.iter().enumerate() {
        let is_last = i == blueprint.nodes.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, node.name, node.role);
        println!(
            "   {}  ├─ {} -> {}",
            child,
            node.bind_socket_addr(),
            node.peer_socket_addr()
        );
        println!(
            "   {}  ├─ Heartbeat: every {}ms, timeout {}s",
            child, node.heartbeat.interval_ms, node.heartbeat.timeout_sec
        );
        let mut flags = Vec::new();
        if node.reply_to_heartbeats {
            flags.push("replies to heartbeats");
        }
        if node.follow_peer_heartbeat {
            flags.push("follows peer heartbeat");
        }
        if !flags.is_empty() {
            println!("   {}  ├─ {}", child, flags.join(", "));
        }

        if with_session {
            let session = session_info(node);
            println!("   {}  ├─ Player: {}", child, session.player);
            if !session.avatars.is_empty() {
                println!("   {}  ├─ Avatars: {}", child, session.avatars.join(", "));
            }
            println!(
                "   {}  ├─ Initial pose: {:?} / {:?} [{}]",
                child, session.initial_position, session.initial_orientation, session.frame_type
            );
        }

        match &node.persistence {
            Some(persistence) => {
                println!("   {}  └─ Pose file: {}", child, persistence.path.display())
            }
            None => println!("   {}  └─ Pose file: (none)", child),
        }
    }

    println!();
}
