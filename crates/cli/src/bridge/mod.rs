//! Bridge orchestration module.

mod control;
mod persistence;
mod service;
mod stats;

pub use service::{BridgeConfig, BridgeService};
