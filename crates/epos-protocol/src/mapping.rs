//! PDO 映射表
//!
//! 声明 4 个 RxPDO 与 4 个 TxPDO 各自承载的对象字典条目及位宽。
//! 反馈解析（`feedback`）依赖这张表的布局，两者必须保持一致。

use crate::ProtocolError;
use crate::ids::*;

/// PDO 负载容量（8 字节）
pub const PDO_PAYLOAD_BITS: u32 = 64;

/// 单个 PDO 最多映射条目数（每条至少 8 bit）
pub const PDO_MAX_ENTRIES: usize = 8;

/// 映射条目：(对象索引, 子索引, 位宽)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoField {
    pub index: u16,
    pub subindex: u8,
    pub bits: u8,
}

impl PdoField {
    pub const fn new(index: u16, subindex: u8, bits: u8) -> Self {
        Self {
            index,
            subindex,
            bits,
        }
    }

    /// 映射参数中的 32 位编码：`index << 16 | subindex << 8 | bits`
    pub const fn encode(self) -> u32 {
        ((self.index as u32) << 16) | ((self.subindex as u32) << 8) | self.bits as u32
    }

    /// 从 32 位编码解析
    pub const fn decode(raw: u32) -> Self {
        Self {
            index: (raw >> 16) as u16,
            subindex: (raw >> 8) as u8,
            bits: raw as u8,
        }
    }
}

/// 一个槽位的映射：槽位 + 有序条目列表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoMapping {
    pub slot: PdoSlot,
    pub fields: &'static [PdoField],
}

impl PdoMapping {
    /// 映射总位宽
    pub fn total_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.bits as u32).sum()
    }

    /// 校验：总位宽不超过 64 bit，且同一槽位内无重复 (index, subindex)
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let bits = self.total_bits();
        if bits > PDO_PAYLOAD_BITS || self.fields.len() > PDO_MAX_ENTRIES {
            return Err(ProtocolError::MappingOverflow {
                slot: self.slot,
                bits,
            });
        }

        for (i, field) in self.fields.iter().enumerate() {
            let duplicated = self.fields[..i]
                .iter()
                .any(|f| f.index == field.index && f.subindex == field.subindex);
            if duplicated {
                return Err(ProtocolError::DuplicateMapping {
                    slot: self.slot,
                    index: field.index,
                    subindex: field.subindex,
                });
            }
        }
        Ok(())
    }
}

const CONTROLWORD: PdoField = PdoField::new(OD_CONTROLWORD, 0x00, 16);
const STATUSWORD: PdoField = PdoField::new(OD_STATUSWORD, 0x00, 16);

/// 接收 PDO（主站 -> 驱动器）映射
pub const RX_PDO_MAPPING: [PdoMapping; 4] = [
    PdoMapping {
        slot: PdoSlot::rx(SlotNumber::One),
        fields: &[
            CONTROLWORD,
            PdoField::new(OD_CURRENT_MODE_SETTING_VALUE, 0x00, 16),
        ],
    },
    PdoMapping {
        slot: PdoSlot::rx(SlotNumber::Two),
        fields: &[CONTROLWORD, PdoField::new(OD_MODES_OF_OPERATION, 0x00, 8)],
    },
    PdoMapping {
        slot: PdoSlot::rx(SlotNumber::Three),
        fields: &[CONTROLWORD, PdoField::new(OD_TARGET_POSITION, 0x00, 32)],
    },
    PdoMapping {
        slot: PdoSlot::rx(SlotNumber::Four),
        fields: &[CONTROLWORD, PdoField::new(OD_TARGET_VELOCITY, 0x00, 32)],
    },
];

/// 发送 PDO（驱动器 -> 主站）映射
pub const TX_PDO_MAPPING: [PdoMapping; 4] = [
    PdoMapping {
        slot: PdoSlot::tx(SlotNumber::One),
        fields: &[STATUSWORD, PdoField::new(OD_CURRENT_ACTUAL_VALUE, 0x00, 16)],
    },
    PdoMapping {
        slot: PdoSlot::tx(SlotNumber::Two),
        fields: &[
            STATUSWORD,
            PdoField::new(OD_MODES_OF_OPERATION, 0x00, 8),
            PdoField::new(OD_MODES_OF_OPERATION_DISPLAY, 0x00, 8),
        ],
    },
    PdoMapping {
        slot: PdoSlot::tx(SlotNumber::Three),
        fields: &[STATUSWORD, PdoField::new(OD_POSITION_ACTUAL_VALUE, 0x00, 32)],
    },
    PdoMapping {
        slot: PdoSlot::tx(SlotNumber::Four),
        fields: &[STATUSWORD, PdoField::new(OD_VELOCITY_ACTUAL_VALUE, 0x00, 32)],
    },
];

/// 全部 8 个槽位的映射（先 RX 后 TX）
pub fn pdo_mapping_table() -> impl Iterator<Item = &'static PdoMapping> {
    RX_PDO_MAPPING.iter().chain(TX_PDO_MAPPING.iter())
}
