//! Bridge service - starts the configured nodes and wires their collaborators.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{NodeConfig, SyncPhase};
use observability::{LinkSample, LinkStatsAggregator};
use sync_engine::{CoordinatorConfig, SyncCoordinator, TickReport};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use transport::{TransportConfig, UdpTransport};

use super::control::{control_loop, ControlCounters, ControlExit};
use super::persistence::JsonPoseFile;
use super::stats::{NodeStats, RunStats};

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Nodes to run
    pub nodes: Vec<NodeConfig>,

    /// Run timeout (None = until interrupted)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Read operator commands from stdin
    pub stdin_control: bool,
}

struct RunningNode {
    coordinator: Arc<SyncCoordinator>,
    observer: JoinHandle<LinkStatsAggregator>,
}

/// Running bridge
pub struct BridgeService {
    nodes: Vec<RunningNode>,
    timeout: Option<Duration>,
    control: Option<JoinHandle<ControlExit>>,
    counters: Arc<ControlCounters>,
    shutdown_tx: watch::Sender<bool>,
    started: Instant,
}

impl BridgeService {
    /// Start every node
    ///
    /// If any node fails to start, the ones already running are stopped.
    pub async fn start(config: BridgeConfig) -> Result<Self> {
        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut nodes = Vec::with_capacity(config.nodes.len());

        for node in &config.nodes {
            match start_node(node, shutdown_rx.clone()).await {
                Ok(running) => nodes.push(running),
                Err(e) => {
                    for running in &nodes {
                        running.coordinator.stop_service().await;
                    }
                    let _ = shutdown_tx.send(true);
                    return Err(e);
                }
            }
        }

        let counters = Arc::new(ControlCounters::default());
        let control = config.stdin_control.then(|| {
            let coordinators = nodes.iter().map(|n| Arc::clone(&n.coordinator)).collect();
            tokio::spawn(control_loop(coordinators, Arc::clone(&counters)))
        });

        info!(nodes = nodes.len(), stdin_control = config.stdin_control, "Bridge running");

        Ok(Self {
            nodes,
            timeout: config.timeout,
            control,
            counters,
            shutdown_tx,
            started: Instant::now(),
        })
    }

    /// Coordinators of the running nodes, in configuration order
    pub fn coordinators(&self) -> impl Iterator<Item = &Arc<SyncCoordinator>> {
        self.nodes.iter().map(|n| &n.coordinator)
    }

    /// Wait until the timeout elapses or the operator quits
    ///
    /// Never returns without a timeout or stdin control; callers race it
    /// against a shutdown signal.
    pub async fn wait(&mut self) {
        let timeout = self.timeout;
        let control = self.control.take();

        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let quit = async {
            if let Some(control) = control {
                match control.await {
                    Ok(ControlExit::Quit) => return,
                    Ok(ControlExit::Eof) => {}
                    Err(e) => warn!(error = ?e, "Control task failed"),
                }
            }
            std::future::pending::<()>().await
        };

        tokio::select! {
            _ = deadline => {
                warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Run timed out");
            }
            _ = quit => {}
        }
    }

    /// Stop every node and collect run statistics
    pub async fn shutdown(mut self) -> RunStats {
        info!("Shutting down bridge...");
        if let Some(control) = self.control.take() {
            control.abort();
        }

        for node in &self.nodes {
            node.coordinator.stop_service().await;
        }
        let _ = self.shutdown_tx.send(true);

        let mut stats = RunStats {
            duration: self.started.elapsed(),
            commands: self.counters.commands.load(Ordering::Relaxed),
            poses_submitted: self.counters.poses_submitted.load(Ordering::Relaxed),
            poses_rejected: self.counters.poses_rejected.load(Ordering::Relaxed),
            ..Default::default()
        };

        for node in self.nodes {
            let coordinator = node.coordinator;
            let mut aggregator = match node.observer.await {
                Ok(aggregator) => aggregator,
                Err(e) => {
                    warn!(node = %coordinator.name(), error = ?e, "Observer task failed");
                    LinkStatsAggregator::new()
                }
            };
            // Ticks only sample the phase; requests change it between ticks
            aggregator.record_counts(coordinator.counts());
            let link = aggregator.summary();
            stats.nodes.push(NodeStats {
                name: coordinator.name().to_string(),
                role: coordinator.role(),
                final_phase: coordinator.current_phase(),
                final_pose: coordinator.current_pose(),
                link,
            });
        }

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Bridge shutdown complete"
        );
        stats
    }
}

/// Build and start one node: transport, coordinator, sink and observer
async fn start_node(node: &NodeConfig, shutdown_rx: watch::Receiver<bool>) -> Result<RunningNode> {
    let mut config = CoordinatorConfig::from_node(node);

    let sink = node
        .persistence
        .as_ref()
        .map(|p| Arc::new(JsonPoseFile::new(&node.name, node.role, &p.path)));
    if let Some(sink) = &sink {
        match sink.load() {
            Ok(Some(saved)) => {
                info!(node = %node.name, path = %sink.path().display(), "Resuming saved pose");
                config.initial_pose = saved.pose;
            }
            Ok(None) => {}
            Err(e) => warn!(node = %node.name, error = %e, "Ignoring unreadable saved pose"),
        }
    }

    let transport = Arc::new(UdpTransport::new(TransportConfig::from_node(node)));
    let mut coordinator = SyncCoordinator::new(config, transport);
    if let Some(sink) = sink {
        coordinator = coordinator.with_pose_sink(sink);
    }
    let coordinator = Arc::new(coordinator);

    // Subscribe before starting so the first tick is observed
    let observer = tokio::spawn(observe(
        node.name.clone(),
        coordinator.subscribe_phase(),
        coordinator.subscribe_ticks(),
        shutdown_rx,
    ));

    let local_addr = match coordinator.start_service().await {
        Ok(addr) => addr,
        Err(e) => {
            observer.abort();
            return Err(e).with_context(|| format!("Failed to start node '{}'", node.name));
        }
    };

    info!(
        node = %node.name,
        role = %node.role,
        local_addr = %local_addr,
        peer = %coordinator.transport().destination(),
        "Node started"
    );

    Ok(RunningNode {
        coordinator,
        observer,
    })
}

/// Phase printer and tick aggregator of one node
async fn observe(
    node: String,
    mut phases: watch::Receiver<SyncPhase>,
    mut ticks: broadcast::Receiver<TickReport>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> LinkStatsAggregator {
    let mut stats = LinkStatsAggregator::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,

            changed = phases.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = *phases.borrow_and_update();
                println!("[{node}] phase {phase}");
            }

            tick = ticks.recv() => match tick {
                Ok(report) => stats.update(&LinkSample {
                    alive: report.liveness.alive,
                    phase: report.phase,
                    receipt_age: report.liveness.receipt_age,
                }),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(node = %node, skipped, "Observer lagged behind tick reports");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    stats
}
