//! # Contracts
//!
//! Frozen interface contracts shared by every bridge crate: wire messages,
//! pose types, the sync phase model, node configuration and error types.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Wire Model
//! - One JSON object per datagram, tagged by `type` (`data` / `event`)
//! - Data messages carry a `data_type` and a typed `data` payload
//! - Event messages carry an `event_type` drawn from a fixed vocabulary

mod error;
mod message;
mod message_kind;
mod node;
mod phase;
mod pose;
mod sink;

pub use error::*;
pub use message::*;
pub use message_kind::MessageKind;
pub use node::*;
pub use phase::*;
pub use pose::*;
pub use sink::PoseSink;
