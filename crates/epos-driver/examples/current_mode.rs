//! 电流模式演示
//!
//! 初始化并使能节点，读取反馈，依次施加 +250 mA / -250 mA，最后停止、快停、失能。
//!
//! ```bash
//! RUST_LOG=debug cargo run -p epos-driver --example current_mode -- --interface can0 --node-id 1
//! ```

use clap::Parser;
use epos_can::ReceiveTimeout;
use epos_driver::{DriverError, EposBuilder, EposConfig, EposNode, FeedbackSample};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "current_mode")]
#[command(about = "Drive an EPOS node in current mode", long_about = None)]
struct Args {
    /// SocketCAN 接口
    #[arg(short, long, default_value = "can0")]
    interface: String,

    /// CANopen 节点 ID
    #[arg(short, long, default_value_t = 1)]
    node_id: u8,

    /// TOML 配置文件（覆盖 interface / node-id 以外的参数）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 电流设定值（mA）
    #[arg(long, default_value_t = 250, allow_hyphen_values = true)]
    current: i16,
}

/// 读取 `count` 帧反馈（超时/警告只记录，不中断）
fn drain<P, C>(node: &mut EposNode<P, C>, sample: &mut FeedbackSample, count: usize)
where
    P: epos_can::CanAdapter,
    C: epos_can::CanAdapter,
{
    for _ in 0..count {
        match node.read_feedback(sample, ReceiveTimeout::from_millis(5)) {
            Ok(()) | Err(DriverError::Timeout) => {},
            Err(e) if !e.is_fatal() => tracing::debug!("feedback: {}", e),
            Err(e) => {
                tracing::error!("feedback: {}", e);
                break;
            },
        }
    }
    println!(
        "Got enc: {}, vel: {} mm/s, current: {} mA",
        sample.position_raw, sample.velocity_mm_s, sample.current_ma
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("epos_driver=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EposConfig::load(path)?,
        None => EposConfig::default(),
    };
    let mut node = EposBuilder::from_config(config)
        .interface(args.interface)
        .node_id(args.node_id)
        .build()?;

    node.enable()?;
    thread::sleep(Duration::from_secs(3));

    let mut sample = FeedbackSample::default();
    drain(&mut node, &mut sample, 100);

    for current in [args.current, args.current.saturating_neg()] {
        node.set_current(current)?;
        for _ in 0..10 {
            drain(&mut node, &mut sample, 100);
            thread::sleep(Duration::from_secs(1));
        }
    }

    node.stop_current()?;
    thread::sleep(Duration::from_secs(1));

    node.halt()?;
    thread::sleep(Duration::from_secs(1));

    node.disable()?;
    node.close();
    Ok(())
}
