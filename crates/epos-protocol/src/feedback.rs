//! 反馈帧结构体定义
//!
//! 包含状态字位域和四个发送 PDO（TxPDO1~4）的解析。
//! 解析严格按 CAN ID 分派，未知 ID 得到 `TxPdo::Unknown` 而不是错误。

use crate::ids::{NodeId, PdoSlot, SlotNumber};
use crate::{EposFrame, ProtocolError, bytes_to_i32_le, bytes_to_u16_le};
use bilge::prelude::*;

// ============================================================================
// 状态字
// ============================================================================

/// 状态字（对象 0x6041）
///
/// 本层只解释 bit 3（故障）和 bit 7（警告），其余位原样透传。
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq)]
pub struct Statusword {
    pub ready_to_switch_on: bool, // Bit 0
    pub switched_on: bool,        // Bit 1
    pub operation_enabled: bool,  // Bit 2
    pub fault: bool,              // Bit 3: 驱动器报告故障
    pub voltage_enabled: bool,    // Bit 4
    pub quick_stop: bool,         // Bit 5
    pub switch_on_disabled: bool, // Bit 6
    pub warning: bool,            // Bit 7: 驱动器报告警告
    pub high: u8,                 // Bit 8-15: 不解释
}

/// 状态字中的 bit 3
pub const STATUSWORD_FAULT: u16 = 0x0008;
/// 状态字中的 bit 7
pub const STATUSWORD_WARNING: u16 = 0x0080;

/// 驱动器上报的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCondition {
    Normal,
    Warning,
    Fault,
}

impl Statusword {
    /// 从原始 16 位值构建
    pub fn from_raw(raw: u16) -> Self {
        Self::from(u16::new(raw))
    }

    /// 原始 16 位值
    pub fn raw(self) -> u16 {
        u16::from(self).value()
    }

    /// 故障优先于警告
    pub fn condition(self) -> DeviceCondition {
        if self.fault() {
            DeviceCondition::Fault
        } else if self.warning() {
            DeviceCondition::Warning
        } else {
            DeviceCondition::Normal
        }
    }
}

// ============================================================================
// TxPDO 解析
// ============================================================================

/// 一帧 TxPDO 的解析结果
///
/// 布局与 [`crate::mapping::TX_PDO_MAPPING`] 一一对应（小端）：
///
/// | 槽位 | Byte 0-1 | Byte 2.. |
/// |---|---|---|
/// | TX1 | 状态字 | 实际电流 (u16 -> i16, mA) |
/// | TX2 | 状态字 | 运行模式（不解析） |
/// | TX3 | 状态字 | 实际位置 (i32, 编码器计数) |
/// | TX4 | 状态字 | 实际速度 (i32, rpm) |
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TxPdo {
    /// TX1
    Current {
        statusword: Statusword,
        current_ma: i16,
    },
    /// TX2（只提取状态字）
    Status { statusword: Statusword },
    /// TX3
    Position {
        statusword: Statusword,
        position_raw: i32,
    },
    /// TX4
    Velocity {
        statusword: Statusword,
        velocity_rpm: i32,
    },
    /// 不属于本节点四个 TxPDO 的帧
    Unknown { cob_id: u32 },
}

impl TxPdo {
    /// 按 CAN ID 分派并解析
    ///
    /// # 错误
    /// - `ProtocolError::InvalidLength`: 已知槽位但数据长度不足
    pub fn decode(frame: &EposFrame, node: NodeId) -> Result<Self, ProtocolError> {
        let Some(slot) = PdoSlot::tx_from_cob_id(frame.id, node) else {
            return Ok(TxPdo::Unknown { cob_id: frame.id });
        };

        let d = &frame.data;
        let pdo = match slot.number {
            SlotNumber::One => {
                frame.require_len(4)?;
                // 电流按 u16 读出后重新解释为有符号
                let raw = bytes_to_u16_le([d[2], d[3]]);
                TxPdo::Current {
                    statusword: statusword_of(frame),
                    current_ma: raw as i16,
                }
            },
            SlotNumber::Two => {
                frame.require_len(2)?;
                TxPdo::Status {
                    statusword: statusword_of(frame),
                }
            },
            SlotNumber::Three => {
                frame.require_len(6)?;
                TxPdo::Position {
                    statusword: statusword_of(frame),
                    position_raw: bytes_to_i32_le([d[2], d[3], d[4], d[5]]),
                }
            },
            SlotNumber::Four => {
                frame.require_len(6)?;
                TxPdo::Velocity {
                    statusword: statusword_of(frame),
                    velocity_rpm: bytes_to_i32_le([d[2], d[3], d[4], d[5]]),
                }
            },
        };
        Ok(pdo)
    }

    /// 所属槽位（`Unknown` 返回 `None`）
    pub fn slot(&self) -> Option<PdoSlot> {
        let number = match self {
            TxPdo::Current { .. } => SlotNumber::One,
            TxPdo::Status { .. } => SlotNumber::Two,
            TxPdo::Position { .. } => SlotNumber::Three,
            TxPdo::Velocity { .. } => SlotNumber::Four,
            TxPdo::Unknown { .. } => return None,
        };
        Some(PdoSlot::tx(number))
    }

    /// 帧中携带的状态字
    pub fn statusword(&self) -> Option<Statusword> {
        match *self {
            TxPdo::Current { statusword, .. }
            | TxPdo::Status { statusword }
            | TxPdo::Position { statusword, .. }
            | TxPdo::Velocity { statusword, .. } => Some(statusword),
            TxPdo::Unknown { .. } => None,
        }
    }
}

fn statusword_of(frame: &EposFrame) -> Statusword {
    Statusword::from_raw(bytes_to_u16_le([frame.data[0], frame.data[1]]))
}
