//! 驱动层错误类型定义

use crate::config::ConfigError;
use epos_can::CanError;
use epos_protocol::{NodeId, ObjectEntry, ProtocolError};
use thiserror::Error;

/// 驱动层错误类型
///
/// 每一种失败都是可区分的变体，本层从不自动重试，由调用方决定恢复策略。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 打开 CAN 通道失败（`init` 中止）
    #[error("Failed to open {channel} channel: {source}")]
    ChannelOpen {
        channel: &'static str,
        #[source]
        source: CanError,
    },

    /// 写对象字典失败
    #[error("Failed to write object {entry}: {source}")]
    ConfigurationWrite {
        entry: ObjectEntry,
        #[source]
        source: Box<DriverError>,
    },

    /// 驱动器中止 SDO 传输
    #[error("SDO abort on 0x{index:04X}:{subindex:02X}, code 0x{code:08X}")]
    SdoAbort { index: u16, subindex: u8, code: u32 },

    /// 等待 SDO 应答超时
    #[error("SDO response timeout for {entry}")]
    SdoTimeout { entry: ObjectEntry },

    /// 等待过程数据超时（可重试）
    #[error("Operation timeout")]
    Timeout,

    /// 状态字 bit 3：驱动器报告故障
    #[error("Device fault on node {node_id} (statusword 0x{statusword:04X})")]
    DeviceFault { node_id: NodeId, statusword: u16 },

    /// 状态字 bit 7：驱动器报告警告
    #[error("Device warning on node {node_id} (statusword 0x{statusword:04X})")]
    DeviceWarning { node_id: NodeId, statusword: u16 },

    /// 节点 ID 不在 1~127
    #[error("Invalid node id: {0}")]
    InvalidNodeId(u8),

    /// 当前生命周期状态不允许该操作
    #[error("Operation '{operation}' not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: crate::LifecycleState,
    },

    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置文件错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DriverError {
    /// 致命错误：节点不可继续使用，调用方不应再发出运动指令
    pub fn is_fatal(&self) -> bool {
        match self {
            DriverError::ChannelOpen { .. }
            | DriverError::ConfigurationWrite { .. }
            | DriverError::SdoAbort { .. }
            | DriverError::InvalidNodeId(_)
            | DriverError::DeviceFault { .. }
            | DriverError::Config(_) => true,
            DriverError::Can(e) => matches!(
                e,
                CanError::BusOff | CanError::BufferOverflow | CanError::NotStarted
            ) || matches!(e, CanError::Device(d) if d.is_fatal()),
            DriverError::SdoTimeout { .. }
            | DriverError::Timeout
            | DriverError::DeviceWarning { .. }
            | DriverError::InvalidState { .. }
            | DriverError::Protocol(_) => false,
        }
    }

    /// 驱动器通过状态字上报的故障/警告
    pub fn is_device_condition(&self) -> bool {
        matches!(
            self,
            DriverError::DeviceFault { .. } | DriverError::DeviceWarning { .. }
        )
    }

    /// 包装为某个对象的写入失败
    pub(crate) fn writing(self, entry: ObjectEntry) -> Self {
        DriverError::ConfigurationWrite {
            entry,
            source: Box::new(self),
        }
    }
}
