//! Bridge 指标收集模块
//!
//! 链路 (datagram) 与相位 (phase) 指标，以及运行摘要聚合。

use contracts::SyncPhase;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// 记录收到的数据报
///
/// `kind` 为消息类型标签 (未知类型统一为 "other")。
pub fn record_datagram_received(kind: &str) {
    counter!(
        "ar_bridge_datagrams_received_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// 记录解码失败的数据报
pub fn record_decode_failure(reason: &str) {
    counter!(
        "ar_bridge_decode_failures_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录数据报发送
pub fn record_datagram_sent(kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ar_bridge_datagrams_sent_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录相位迁移
pub fn record_phase_transition(from: SyncPhase, to: SyncPhase) {
    counter!(
        "ar_bridge_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("ar_bridge_current_phase").set(f64::from(to.code()));
}

/// 记录一次心跳判定
///
/// `receipt_age`: 距上次收到数据报的时长 (None = 从未收到)
pub fn record_liveness(alive: bool, receipt_age: Option<Duration>) {
    gauge!("ar_bridge_peer_alive").set(if alive { 1.0 } else { 0.0 });
    counter!("ar_bridge_heartbeats_total").increment(1);
    if let Some(age) = receipt_age {
        histogram!("ar_bridge_receipt_age_ms").record(age.as_secs_f64() * 1000.0);
    }
}

/// 记录被接受的位姿更新
pub fn record_pose_accepted() {
    counter!("ar_bridge_poses_accepted_total").increment(1);
}

/// 单次 tick 的样本
#[derive(Debug, Clone, Copy)]
pub struct LinkSample {
    pub alive: bool,
    /// tick 结束时的相位
    pub phase: SyncPhase,
    pub receipt_age: Option<Duration>,
}

/// 相位机与位姿的累计计数
///
/// 由 sync_engine 在迁移/接受发生处累加，不依赖 tick 采样，不会漏计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    /// 相位迁移次数
    pub transitions: u64,
    /// 回到 WAITING 的次数 (对端丢失或 reset)
    pub disconnects: u64,
    /// 被接受的位姿数 (本地提交 + 对端应用)
    pub poses_accepted: u64,
}

/// 链路指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct LinkStatsAggregator {
    /// 总 tick 数
    pub total_ticks: u64,

    /// 对端存活的 tick 数
    pub alive_ticks: u64,

    /// 相位迁移次数
    pub transitions: u64,

    /// 回到 WAITING 的次数 (对端丢失或 reset)
    pub disconnects: u64,

    /// 被接受的位姿更新数
    pub poses_accepted: u64,

    /// 最后观察到的相位
    pub last_phase: SyncPhase,

    /// 数据报间隔统计 (毫秒)
    pub receipt_age_stats: RunningStats,
}

impl LinkStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, sample: &LinkSample) {
        self.total_ticks += 1;
        if sample.alive {
            self.alive_ticks += 1;
        }

        self.last_phase = sample.phase;

        if let Some(age) = sample.receipt_age {
            self.receipt_age_stats.push(age.as_secs_f64() * 1000.0);
        }
    }

    /// 合并 sync_engine 的累计计数
    ///
    /// 计数为总量快照，重复合并以最新一次为准。
    pub fn record_counts(&mut self, counts: SyncCounts) {
        self.transitions = counts.transitions;
        self.disconnects = counts.disconnects;
        self.poses_accepted = counts.poses_accepted;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> LinkSummary {
        LinkSummary {
            total_ticks: self.total_ticks,
            alive_ticks: self.alive_ticks,
            availability: if self.total_ticks > 0 {
                self.alive_ticks as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            },
            transitions: self.transitions,
            disconnects: self.disconnects,
            poses_accepted: self.poses_accepted,
            last_phase: self.last_phase,
            receipt_age_ms: StatsSummary::from(&self.receipt_age_stats),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct LinkSummary {
    pub total_ticks: u64,
    pub alive_ticks: u64,
    pub availability: f64,
    pub transitions: u64,
    pub disconnects: u64,
    pub poses_accepted: u64,
    pub last_phase: SyncPhase,
    pub receipt_age_ms: StatsSummary,
}

impl std::fmt::Display for LinkSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Ticks: {}", self.total_ticks)?;
        writeln!(
            f,
            "Peer alive: {} ({:.2}%)",
            self.alive_ticks, self.availability
        )?;
        writeln!(
            f,
            "Phase transitions: {} (disconnects: {})",
            self.transitions, self.disconnects
        )?;
        writeln!(f, "Poses accepted: {}", self.poses_accepted)?;
        writeln!(f, "Final phase: {}", self.last_phase)?;
        writeln!(f, "Receipt age (ms): {}", self.receipt_age_ms)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
