//! Gunboat 守护进程主入口
//!
//! 装配船体，在配置的地址上接受 TCP 行协议控制器，Ctrl+C 时按顺序关闭：
//! 控制器（服务端与连接线程）→ 船体（停船、炮塔归位）→ 扩展芯片。

mod assembly;
mod config;

use anyhow::{Context, Result};
use assembly::Fleet;
use clap::Parser;
use config::{BusConfig, DaemonConfig};
use gunboat_control::{ConnectionController, Server, TcpSource, TracingObserver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Gunboat 守护进程
#[derive(Parser, Debug)]
#[command(name = "gunboatd")]
#[command(about = "Gunboat daemon - remote control for a multi-motor, multi-turret boat", long_about = None)]
struct Args {
    /// 配置文件路径（TOML）
    ///
    /// 不指定时使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址，可重复指定；覆盖配置文件
    ///
    /// 格式: IP:PORT (例如: 0.0.0.0:5005)
    #[arg(long)]
    listen: Vec<String>,

    /// I2C 总线编号（/dev/i2c-N）；覆盖配置文件
    #[arg(long)]
    i2c_bus: Option<u8>,

    /// 步进相间延时（毫秒）；覆盖配置文件
    #[arg(long)]
    period_ms: Option<u64>,

    /// 日志级别（RUST_LOG 未设置时生效）
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 打印生效的配置后退出
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn load_config(&self) -> Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::load(path)?,
            None => DaemonConfig::default(),
        };
        if !self.listen.is_empty() {
            config.listen = self.listen.clone();
        }
        if let Some(bus) = self.i2c_bus {
            config.bus = BusConfig::I2c { bus };
        }
        if let Some(period_ms) = self.period_ms {
            config.sequencer.period_ms = period_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.load_config()?;
    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("failed to set signal handler")?;

    let fleet = Fleet::build(&config)?;
    let controller = ConnectionController::new(config.targeting);
    controller.add_observer(Arc::new(TracingObserver));
    let topology = controller
        .attach_boat(fleet.boat.clone())
        .context("failed to attach boat")?;
    info!("Targeting layout: {:?}", topology);

    for address in &config.listen {
        if let Err(e) = controller.add_server(Server::new(TcpSource::new(address.clone()))) {
            warn!("Not listening on {}: {}", address, e);
        }
    }
    if controller.server_count() == 0 {
        warn!("No server is accepting connections");
    }

    info!("gunboatd started. Press Ctrl+C to stop.");
    let _ = shutdown_rx.recv();

    info!("Shutting down...");
    controller.shutdown();
    fleet.shutdown()?;
    info!("Stopped");
    Ok(())
}
