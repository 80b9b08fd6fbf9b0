//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::NodeConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::bridge::{BridgeConfig, BridgeService};
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        warn!(warning = %warning, "Configuration warning");
    }

    let nodes = select_nodes(blueprint.nodes, &args.nodes)?;

    info!(
        nodes = nodes.len(),
        names = ?nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&nodes);
        return Ok(());
    }

    let config = BridgeConfig {
        nodes,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        stdin_control: args.stdin_control,
    };

    let mut service = BridgeService::start(config)
        .await
        .context("Failed to start bridge")?;

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        _ = service.wait() => {}
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping bridge...");
        }
    }

    let stats = service.shutdown().await;
    stats.print_summary();

    info!("AR Bridge finished");
    Ok(())
}

/// Keep only the nodes named on the command line (all when none are named)
fn select_nodes(nodes: Vec<NodeConfig>, wanted: &[String]) -> Result<Vec<NodeConfig>, CliError> {
    if wanted.is_empty() {
        return Ok(nodes);
    }

    for name in wanted {
        if !nodes.iter().any(|n| &n.name == name) {
            let available: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
            return Err(CliError::unknown_node(name, &available));
        }
    }

    Ok(nodes
        .into_iter()
        .filter(|n| wanted.contains(&n.name))
        .collect())
}

/// Setup Ctrl+C and SIGTERM signal handlers
pub(crate) async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(nodes: &[NodeConfig]) {
    println!("\n=== Configuration Summary ===\n");
    println!("Nodes ({}):", nodes.len());
    for node in nodes {
        println!(
            "  - {} ({}) {} -> {}",
            node.name,
            node.role,
            node.bind_socket_addr(),
            node.peer_socket_addr()
        );
        println!(
            "      heartbeat every {}ms, timeout {}s",
            node.heartbeat.interval_ms, node.heartbeat.timeout_sec
        );
        if let Some(ref persistence) = node.persistence {
            println!("      pose file: {}", persistence.path.display());
        }
    }
    println!();
}
