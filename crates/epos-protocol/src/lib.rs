//! # EPOS Protocol
//!
//! EPOS 驱动器 CANopen 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: COB-ID 基址与对象字典索引
//! - `control`: 控制字、运行模式、RxPDO 控制帧构建
//! - `feedback`: 状态字与 TxPDO 反馈帧解析
//! - `config`: 配置通道帧（NMT / SDO）
//! - `mapping`: PDO 映射表
//! - `units`: 物理单位换算
//!
//! ## 字节序
//!
//! CANopen 使用 Intel（LSB）低位在前（小端字节序）。
//! 本模块提供了字节序转换工具函数。

pub mod config;
pub mod control;
pub mod feedback;
pub mod ids;
pub mod mapping;
pub mod units;

// 重新导出常用类型
pub use config::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use mapping::*;
pub use units::*;

/// CAN 2.0 标准帧的统一抽象
///
/// 协议层和 CAN 层之间的中间类型：
///
/// ```text
/// Protocol Layer (epos-protocol)
///     ↓ TxPdo::decode 解析 / to_frame() 构建
/// EposFrame (此类型)
///     ↓ 转换逻辑在 CAN 层实现
/// CAN Layer (epos-can)
///     ↓ SocketCAN / Mock 适配器
/// Hardware
/// ```
///
/// # 转换示例
///
/// ```rust
/// use epos_protocol::EposFrame;
///
/// let frame = EposFrame::new_standard(0x181, &[0x00, 0x00, 0xFA, 0x00]);
///
/// assert_eq!(frame.id(), 0x181);
/// assert_eq!(frame.data_slice(), &[0x00, 0x00, 0xFA, 0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EposFrame {
    /// CAN ID（CANopen 只使用 11-bit 标准帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,
}

impl EposFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }

    /// 检查有效长度是否满足要求
    pub(crate) fn require_len(&self, expected: usize) -> Result<(), ProtocolError> {
        if (self.len as usize) < expected {
            return Err(ProtocolError::InvalidLength {
                expected,
                actual: self.len as usize,
            });
        }
        Ok(())
    }
}

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: i64 },

    #[error("PDO {slot} mapping uses {bits} bits, payload holds at most 64")]
    MappingOverflow { slot: PdoSlot, bits: u32 },

    #[error("PDO {slot} maps object 0x{index:04X}:{subindex} more than once")]
    DuplicateMapping {
        slot: PdoSlot,
        index: u16,
        subindex: u8,
    },

    #[error("Unexpected SDO response command 0x{command:02X}")]
    UnexpectedSdoResponse { command: u8 },
}

/// 字节序转换工具函数
///
/// 小端字节序转 u16
pub fn bytes_to_u16_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// 小端字节序转 i32
pub fn bytes_to_i32_le(bytes: [u8; 4]) -> i32 {
    i32::from_le_bytes(bytes)
}

/// 小端字节序转 u32
pub fn bytes_to_u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// u16 转小端字节序
pub fn u16_to_bytes_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// i16 转小端字节序
pub fn i16_to_bytes_le(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}
