//! Operator control over stdin.
//!
//! One command per line, applied to every running node:
//!
//! ```text
//! pose <x> <y> <z> <rx> <ry> <rz>   submit a pose (POSITIONING only)
//! play                              request PLAYING
//! reset                             request WAITING
//! status                            print phase, liveness and pose
//! quit                              stop the bridge
//! ```

use contracts::Vector3;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sync_engine::SyncCoordinator;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

const HELP: &str = "commands: pose <x> <y> <z> <rx> <ry> <rz> | play | reset | status | quit";

/// Parsed control line
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Pose {
        position: Vector3,
        orientation: Vector3,
    },
    Play,
    Reset,
    Status,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = CliError;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CliError::invalid_command(line, "empty command"));
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "pose" => {
                if args.len() != 6 {
                    return Err(CliError::invalid_command(
                        line,
                        format!("pose takes 6 numbers, got {}", args.len()),
                    ));
                }
                let mut values = [0.0f64; 6];
                for (slot, raw) in values.iter_mut().zip(&args) {
                    *slot = raw
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| {
                            CliError::invalid_command(line, format!("'{raw}' is not a finite number"))
                        })?;
                }
                Self::Pose {
                    position: Vector3::new(values[0], values[1], values[2]),
                    orientation: Vector3::new(values[3], values[4], values[5]),
                }
            }
            "play" => Self::Play,
            "reset" => Self::Reset,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => {
                return Err(CliError::invalid_command(
                    line,
                    format!("unknown command '{other}'"),
                ))
            }
        };

        if !matches!(command, Self::Pose { .. }) && !args.is_empty() {
            return Err(CliError::invalid_command(line, format!("'{verb}' takes no arguments")));
        }
        Ok(command)
    }
}

/// How the control loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlExit {
    Quit,
    Eof,
}

/// Counters shared with the run summary
#[derive(Debug, Default)]
pub struct ControlCounters {
    pub commands: AtomicU64,
    pub poses_submitted: AtomicU64,
    pub poses_rejected: AtomicU64,
}

/// Read commands from stdin until `quit` or end of input
pub async fn control_loop(
    nodes: Vec<Arc<SyncCoordinator>>,
    counters: Arc<ControlCounters>,
) -> ControlExit {
    let mut lines = spawn_stdin_reader();
    println!("{HELP}");

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ControlCommand>() {
            Ok(ControlCommand::Quit) => {
                info!("Quit requested from stdin");
                return ControlExit::Quit;
            }
            Ok(command) => {
                counters.commands.fetch_add(1, Ordering::Relaxed);
                apply(&nodes, &command, &counters);
            }
            Err(e) => {
                eprintln!("{e}");
                eprintln!("{HELP}");
            }
        }
    }

    info!("stdin closed, control disabled");
    ControlExit::Eof
}

fn apply(nodes: &[Arc<SyncCoordinator>], command: &ControlCommand, counters: &ControlCounters) {
    debug!(command = ?command, nodes = nodes.len(), "Applying control command");
    for node in nodes {
        match command {
            ControlCommand::Pose {
                position,
                orientation,
            } => {
                counters.poses_submitted.fetch_add(1, Ordering::Relaxed);
                if node.submit_pose(*position, *orientation) {
                    println!("[{}] pose accepted", node.name());
                } else {
                    counters.poses_rejected.fetch_add(1, Ordering::Relaxed);
                    println!(
                        "[{}] pose rejected in {}",
                        node.name(),
                        node.current_phase()
                    );
                }
            }
            ControlCommand::Play => {
                println!("[{}] phase {}", node.name(), node.request_play_start());
            }
            ControlCommand::Reset => {
                println!("[{}] phase {}", node.name(), node.request_reset());
            }
            ControlCommand::Status => print_status(node),
            ControlCommand::Quit => {}
        }
    }
}

fn print_status(node: &SyncCoordinator) {
    let pose = node.current_pose();
    let peer = node.peer_status();
    println!(
        "[{}] {} phase={} peer_alive={} destination={}",
        node.name(),
        node.role(),
        node.current_phase(),
        node.is_peer_alive(),
        node.transport().destination()
    );
    println!(
        "    pose {} position=({}, {}, {}) orientation=({}, {}, {})",
        pose.frame_type,
        pose.pose.position.x,
        pose.pose.position.y,
        pose.pose.position.z,
        pose.pose.orientation.x,
        pose.pose.orientation.y,
        pose.pose.orientation.z
    );
    if let Some(status) = peer.last_status {
        println!("    peer reports {status}");
    }
    if let Some(heartbeat) = peer.last_heartbeat {
        println!(
            "    peer heartbeat from {}:{} (schema v{})",
            heartbeat.sender_address, heartbeat.sender_listen_port, heartbeat.schema_version
        );
    }
}

/// Blocking stdin reads live on their own thread so they never hold up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("stdin-control".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn stdin reader");
    }
    rx
}
