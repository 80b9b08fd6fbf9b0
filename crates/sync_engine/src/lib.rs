//! # Sync Engine
//!
//! Phase synchronization between a local node and its AR peer.
//!
//! 负责：
//! - 三态相位机 (WAITING / POSITIONING / PLAYING)
//! - 心跳发送与存活判定
//! - 按角色 (driving / listening) 协调位姿与 play/reset 事件
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{CoordinatorConfig, SyncCoordinator};
//! use transport::{TransportConfig, UdpTransport};
//!
//! let transport = Arc::new(UdpTransport::new(TransportConfig::from_node(&node)));
//! let coordinator = SyncCoordinator::new(CoordinatorConfig::from_node(&node), transport);
//!
//! coordinator.start_service().await?;
//! if coordinator.current_phase() == SyncPhase::Positioning {
//!     coordinator.submit_pose(position, orientation);
//! }
//! coordinator.stop_service().await;
//! ```

mod coordinator;
mod liveness;
mod state;

pub use coordinator::{AppliedUpdate, CoordinatorConfig, PeerStatus, SyncCoordinator, TickReport};
pub use liveness::{HeartbeatIdentity, LivenessMonitor, LivenessReport};
pub use state::{SyncStateMachine, Transition};

// Re-export contracts types
pub use contracts::{Role, SyncPhase};
