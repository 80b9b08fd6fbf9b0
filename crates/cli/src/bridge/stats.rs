//! Run statistics.

use std::time::Duration;

use contracts::{PoseFrame, Role, SyncPhase};
use observability::LinkSummary;

/// Per-node outcome of a run
#[derive(Debug, Clone)]
pub struct NodeStats {
    pub name: String,
    pub role: Role,
    pub final_phase: SyncPhase,
    pub final_pose: PoseFrame,
    /// Aggregated tick reports
    pub link: LinkSummary,
}

/// Statistics from a bridge run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    pub nodes: Vec<NodeStats>,

    /// Control commands applied (stdin)
    pub commands: u64,

    /// Poses submitted from stdin, per node
    pub poses_submitted: u64,

    /// Submitted poses rejected outside POSITIONING
    pub poses_rejected: u64,
}

impl RunStats {
    /// Share of ticks with a live peer, over all nodes
    pub fn availability(&self) -> f64 {
        let (alive, total) = self.nodes.iter().fold((0, 0), |(alive, total), node| {
            (alive + node.link.alive_ticks, total + node.link.total_ticks)
        });
        if total > 0 {
            alive as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Bridge Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Nodes: {}", self.nodes.len());
        println!("   ├─ Peer availability: {:.2}%", self.availability());
        println!("   ├─ Control commands: {}", self.commands);
        println!(
            "   └─ Poses submitted: {} ({} rejected)",
            self.poses_submitted, self.poses_rejected
        );

        for node in &self.nodes {
            let link = &node.link;
            let position = node.final_pose.pose.position;
            println!("\n📡 {} ({})", node.name, node.role);
            println!("   ├─ Final phase: {}", node.final_phase);
            println!(
                "   ├─ Ticks: {} (peer alive {:.2}%)",
                link.total_ticks, link.availability
            );
            println!(
                "   ├─ Phase transitions: {} (disconnects: {})",
                link.transitions, link.disconnects
            );
            println!("   ├─ Poses accepted: {}", link.poses_accepted);
            println!("   ├─ Receipt age (ms): {}", link.receipt_age_ms);
            println!(
                "   └─ Last pose: ({:.3}, {:.3}, {:.3}) [{}]",
                position.x, position.y, position.z, node.final_pose.frame_type
            );
        }

        println!();
    }
}
