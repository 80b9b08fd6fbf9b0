//! # Observability
//!
//! 可观测性模块：Prometheus 指标 + 运行摘要统计。
//!
//! ## 功能
//!
//! - 链路指标 (收发数据报、解码失败)
//! - 相位迁移与对端存活指标
//! - Prometheus 指标导出
//! - 运行摘要聚合
//!
//! ## 使用示例
//!
//! ```ignore
//! // 启动 Prometheus 端点
//! observability::init_metrics_only(9000)?;
//!
//! // 记录指标
//! observability::record_datagram_received("heartbeat_request");
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

// Re-exports
pub use crate::metrics::{
    record_datagram_received, record_datagram_sent, record_decode_failure, record_liveness,
    record_phase_transition, record_pose_accepted, LinkSample, LinkStatsAggregator, LinkSummary,
    RunningStats, StatsSummary, SyncCounts,
};

/// 仅初始化 Prometheus 指标（Tracing 由二进制入口初始化）
///
/// 监听 0.0.0.0:`port`，未调用时所有指标记录为空操作。
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
