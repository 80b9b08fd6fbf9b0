//! # AR Bridge CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 节点启动与生命周期管理
//! - 模拟 AR 头显 (mock-peer)
//! - 优雅关闭处理
//!
//! 日志写 stderr；stdout 只输出相位变化、`status` 结果与运行摘要。

mod bridge;
mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::Layer;

use cli::{Cli, Commands};
use commands::{run_bridge, run_info, run_mock_peer, run_validate};

/// Bridge crates whose level follows `-v`; dependencies stay at warn
const BRIDGE_TARGETS: [&str; 6] = [
    "ar_bridge",
    "contracts",
    "config_loader",
    "transport",
    "sync_engine",
    "observability",
];

#[tokio::main]
async fn main() -> Result<()> {
    // AR_BRIDGE_* defaults may live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "AR Bridge starting");

    let result = match &cli.command {
        Commands::Run(args) => run_bridge(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::MockPeer(args) => run_mock_peer(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// Logs go to stderr. Stdout carries phase changes, `status` output and the
/// run summary, so it stays readable with stdin control.
fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        // -vv adds per-datagram transport traces
        let bridge_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directives = BRIDGE_TARGETS
                .iter()
                .map(|target| format!("{target}={bridge_level}"))
                .collect::<Vec<_>>()
                .join(",");
            EnvFilter::new(format!("warn,{directives}"))
        })
    };

    let fmt_layer = match cli.log_format {
        cli::LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        cli::LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).pretty().boxed(),
        cli::LogFormat::Compact => fmt::layer().with_writer(std::io::stderr).compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
