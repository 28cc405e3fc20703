//! # EPOS Driver
//!
//! maxon EPOS 驱动器的 CANopen 驱动层：
//! - 配置通道：SDO 客户端 + NMT 主站（[`SdoClient`]）
//! - PDO 映射配置（[`configure_node`]）
//! - 生命周期管理与电流模式接口（[`EposNode`]）
//! - 过程数据收发（[`PdoChannel`]）
//!
//! # 使用
//!
//! ```no_run
//! use epos_can::ReceiveTimeout;
//! use epos_driver::{EposBuilder, FeedbackSample};
//! use std::time::Duration;
//!
//! let mut node = EposBuilder::new().interface("can0").node_id(1).build()?;
//! node.enable()?;
//! node.set_current(250)?;
//!
//! let mut sample = FeedbackSample::default();
//! node.read_feedback(&mut sample, ReceiveTimeout::After(Duration::from_millis(5)))?;
//! println!("current: {} mA", sample.current_ma);
//!
//! node.stop_current()?;
//! node.halt()?;
//! node.disable()?;
//! node.close();
//! # Ok::<(), epos_driver::DriverError>(())
//! ```

mod builder;
pub mod config;
pub mod configurator;
mod error;
mod node;
pub mod process_data;
pub mod sdo;
pub mod state;

pub use builder::{EposBuilder, config_filters, pdo_filters};
pub use config::{ConfigError, EposConfig, ProfileConfig};
pub use configurator::configure_node;
pub use error::DriverError;
pub use node::EposNode;
pub use process_data::PdoChannel;
pub use sdo::{DEFAULT_SDO_TIMEOUT, NetworkManagement, ObjectDictionary, SdoClient};
pub use state::{FeedbackSample, LifecycleState, StepReport};
