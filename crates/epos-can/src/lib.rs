//! # EPOS CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN 接口抽象。
//!
//! - Linux: SocketCAN 后端（带硬件 ID/掩码过滤）
//! - `mock` feature: 内存中的模拟总线，用于测试

use std::time::Duration;
use thiserror::Error;

// 重新导出 epos-protocol 中的 EposFrame
pub use epos_protocol::EposFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(feature = "mock")]
pub mod mock;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    /// 底层 IO 错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 设备相关错误（接口不存在、未启动、配置失败等）
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),

    /// 读取超时（非致命，可以重试）
    #[error("Read timeout")]
    Timeout,

    /// 缓冲区溢出（致命错误）
    #[error("Buffer overflow")]
    BufferOverflow,

    /// 总线关闭（致命错误，需要重启）
    #[error("Bus off")]
    BusOff,

    /// 设备未启动
    #[error("Device not started")]
    NotStarted,
}

/// 设备/后端错误的结构化分类（不绑定具体后端实现）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    /// 接口不存在
    NotFound,
    /// 接口存在但未启动（DOWN）
    NotUp,
    /// 权限不足/被拒绝
    AccessDenied,
    /// 过滤器/超时等配置失败
    UnsupportedConfig,
    /// 解析到无效帧
    InvalidFrame,
    /// 其他 IO/后端错误
    Backend,
}

/// 结构化设备错误：kind + message
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 判断是否为致命错误
    ///
    /// 致命错误表示通道不可用，需要重新打开。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::NotFound
                | CanDeviceErrorKind::NotUp
                | CanDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// 接收过滤器：`received_id & mask == id & mask` 时接收
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFilter {
    pub id: u32,
    pub mask: u32,
}

impl IdFilter {
    pub const fn new(id: u32, mask: u32) -> Self {
        Self { id, mask }
    }

    /// 精确匹配一个 11-bit 标准 ID
    pub const fn exact(id: u32) -> Self {
        Self::new(id, epos_protocol::COB_MASK)
    }

    /// 判断某个 ID 是否通过过滤器
    pub fn matches(&self, id: u32) -> bool {
        id & self.mask == self.id & self.mask
    }
}

/// 接收超时语义
///
/// 与 `poll(2)` 的超时参数一一对应：
/// - `0` -> [`ReceiveTimeout::Poll`]：立即返回
/// - `>0` -> [`ReceiveTimeout::After`]：最多等待指定时间
/// - `<0` -> [`ReceiveTimeout::Forever`]：无限阻塞
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveTimeout {
    Poll,
    After(Duration),
    Forever,
}

impl ReceiveTimeout {
    /// 按 poll 约定从毫秒数构建
    pub fn from_millis(ms: i32) -> Self {
        match ms {
            0 => ReceiveTimeout::Poll,
            ms if ms > 0 => ReceiveTimeout::After(Duration::from_millis(ms as u64)),
            _ => ReceiveTimeout::Forever,
        }
    }

    /// 转换为 poll 毫秒数（-1 表示无限）
    pub fn as_poll_millis(self) -> i32 {
        match self {
            ReceiveTimeout::Poll => 0,
            ReceiveTimeout::After(d) => d.as_millis().clamp(1, i32::MAX as u128) as i32,
            ReceiveTimeout::Forever => -1,
        }
    }
}

impl From<Duration> for ReceiveTimeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            ReceiveTimeout::Poll
        } else {
            ReceiveTimeout::After(d)
        }
    }
}

/// CAN 适配器 Trait
///
/// 语义：
/// - `send()`: Fire-and-Forget，写入内核发送队列即返回
/// - `receive_timeout()`: 阻塞直到收到一帧通过过滤器的数据帧或超时
pub trait CanAdapter {
    /// 发送一帧
    ///
    /// # 错误处理
    /// - 通道未打开 → `CanError::NotStarted`
    /// - 写入失败 → `CanError::Io` 或 `CanError::Device`
    fn send(&mut self, frame: EposFrame) -> Result<(), CanError>;

    /// 带超时的接收
    ///
    /// # 错误处理
    /// - 超时 → `CanError::Timeout`（可重试）
    /// - 缓冲区溢出 → `CanError::BufferOverflow`（致命）
    /// - 总线关闭 → `CanError::BusOff`（致命）
    fn receive_timeout(&mut self, timeout: ReceiveTimeout) -> Result<EposFrame, CanError>;

    /// 阻塞接收
    fn receive(&mut self) -> Result<EposFrame, CanError> {
        self.receive_timeout(ReceiveTimeout::Forever)
    }

    /// 非阻塞接收
    ///
    /// 当前没有可用数据时返回 `Ok(None)`。
    fn try_receive(&mut self) -> Result<Option<EposFrame>, CanError> {
        match self.receive_timeout(ReceiveTimeout::Poll) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<A: CanAdapter + ?Sized> CanAdapter for Box<A> {
    fn send(&mut self, frame: EposFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive_timeout(&mut self, timeout: ReceiveTimeout) -> Result<EposFrame, CanError> {
        (**self).receive_timeout(timeout)
    }
}
