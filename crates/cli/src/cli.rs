//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// AR Bridge - pose and phase synchronization with AR headsets over UDP
#[derive(Parser, Debug)]
#[command(
    name = "ar-bridge",
    author,
    version,
    about = "UDP pose/phase sync bridge for AR headsets",
    long_about = "Keeps a simulation controller and an AR headset in agreement on the\n\
                  session phase (WAITING / POSITIONING / PLAYING) and on the\n\
                  scene-anchoring pose, using JSON datagrams over UDP."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AR_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "AR_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured bridge nodes
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Stand in for an AR headset: a listening node that answers heartbeats
    MockPeer(MockPeerArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "bridge.toml",
        env = "AR_BRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// Only run the named node (repeatable; default: all nodes)
    #[arg(short, long = "node", value_name = "NAME")]
    pub nodes: Vec<String>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "AR_BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without starting nodes
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "AR_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Read control commands (pose / play / reset / status / quit) from stdin
    #[arg(long)]
    pub stdin_control: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bridge.toml", env = "AR_BRIDGE_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.toml", env = "AR_BRIDGE_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show session details (player, avatars, initial pose)
    #[arg(long)]
    pub session: bool,
}

/// Arguments for the `mock-peer` command
#[derive(Parser, Debug, Clone)]
pub struct MockPeerArgs {
    /// Local address to listen on
    #[arg(long, default_value = "0.0.0.0:38528", env = "AR_BRIDGE_MOCK_BIND")]
    pub bind: SocketAddr,

    /// Initial address of the driving node (followed from its heartbeats)
    #[arg(long, default_value = "127.0.0.1:48528", env = "AR_BRIDGE_MOCK_PEER")]
    pub peer: SocketAddr,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Seconds of silence after which the driving node counts as gone
    #[arg(long, default_value = "5.0")]
    pub timeout_sec: f64,

    /// Write accepted poses to this JSON file
    #[arg(long, value_name = "PATH")]
    pub persist: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0")]
    pub timeout: u64,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
