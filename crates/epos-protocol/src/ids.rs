//! COB-ID 常量定义和对象字典索引
//!
//! 定义 CANopen 预定义连接集（Predefined Connection Set）中的 COB-ID 基址、
//! EPOS 对象字典索引，并提供 PDO 槽位与 COB-ID 之间的互相换算。

use crate::ProtocolError;
use std::fmt;

/// 11-bit 标准帧 ID 掩码（用于硬件过滤）
pub const COB_MASK: u32 = 0x7FF;

/// NMT 广播目标（所有节点）
pub const CANOPEN_BROADCAST_ID: u8 = 0x00;

// ============================================================================
// COB-ID 基址
// ============================================================================

/// NMT 模块控制
pub const ID_NMT: u32 = 0x000;

/// NMT 错误控制（心跳 / Boot-up），+ node_id
pub const ID_NMT_ERROR_CONTROL: u32 = 0x700;

/// SDO 应答（驱动器 -> 主站），+ node_id
pub const ID_SDO_TX: u32 = 0x580;

/// SDO 请求（主站 -> 驱动器），+ node_id
pub const ID_SDO_RX: u32 = 0x600;

/// 接收 PDO（主站 -> 驱动器）基址，按槽位 1~4
pub const PDO_RX_BASE: [u32; 4] = [0x200, 0x300, 0x400, 0x500];

/// 发送 PDO（驱动器 -> 主站）基址，按槽位 1~4
pub const PDO_TX_BASE: [u32; 4] = [0x180, 0x280, 0x380, 0x480];

// ============================================================================
// 对象字典索引
// ============================================================================

/// 接收 PDO 通讯参数（0x1400 + n - 1）
pub const OD_RX_PDO_COMM_BASE: u16 = 0x1400;
/// 接收 PDO 映射参数（0x1600 + n - 1）
pub const OD_RX_PDO_MAPPING_BASE: u16 = 0x1600;
/// 发送 PDO 通讯参数（0x1800 + n - 1）
pub const OD_TX_PDO_COMM_BASE: u16 = 0x1800;
/// 发送 PDO 映射参数（0x1A00 + n - 1）
pub const OD_TX_PDO_MAPPING_BASE: u16 = 0x1A00;

/// 杂项配置（EPOS 专有）
pub const OD_MISCELLANEOUS_CONFIGURATION: u16 = 0x2008;
/// 电流模式设定值（EPOS 专有）
pub const OD_CURRENT_MODE_SETTING_VALUE: u16 = 0x2030;
/// 控制字
pub const OD_CONTROLWORD: u16 = 0x6040;
/// 状态字
pub const OD_STATUSWORD: u16 = 0x6041;
/// 运行模式
pub const OD_MODES_OF_OPERATION: u16 = 0x6060;
/// 运行模式显示
pub const OD_MODES_OF_OPERATION_DISPLAY: u16 = 0x6061;
/// 实际位置
pub const OD_POSITION_ACTUAL_VALUE: u16 = 0x6064;
/// 实际速度
pub const OD_VELOCITY_ACTUAL_VALUE: u16 = 0x606C;
/// 实际电流
pub const OD_CURRENT_ACTUAL_VALUE: u16 = 0x6078;
/// 目标位置
pub const OD_TARGET_POSITION: u16 = 0x607A;
/// 最大轮廓速度
pub const OD_MAX_PROFILE_VELOCITY: u16 = 0x607F;
/// 轮廓加速度
pub const OD_PROFILE_ACCELERATION: u16 = 0x6083;
/// 轮廓减速度
pub const OD_PROFILE_DECELERATION: u16 = 0x6084;
/// 急停减速度
pub const OD_QUICKSTOP_DECELERATION: u16 = 0x6085;
/// 运动轮廓类型
pub const OD_MOTION_PROFILE_TYPE: u16 = 0x6086;
/// 目标速度
pub const OD_TARGET_VELOCITY: u16 = 0x60FF;

/// PDO 通讯参数子索引：COB-ID
pub const PDO_COMM_SUB_COB_ID: u8 = 0x01;
/// PDO 通讯参数子索引：传输类型
pub const PDO_COMM_SUB_TRANSMISSION_TYPE: u8 = 0x02;
/// 传输类型：异步（事件驱动）
pub const PDO_TRANSMISSION_ASYNC: u8 = 0xFF;

// ============================================================================
// 节点 ID
// ============================================================================

/// CANopen 节点 ID（1~127）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct NodeId(u8);

impl NodeId {
    /// 创建节点 ID，超出 1~127 返回错误
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if (1..=127).contains(&id) {
            Ok(Self(id))
        } else {
            Err(ProtocolError::InvalidValue {
                field: "NodeId".to_string(),
                value: id as i64,
            })
        }
    }

    /// 获取原始值
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SDO 请求 COB-ID
pub fn sdo_request_id(node: NodeId) -> u32 {
    ID_SDO_RX + node.get() as u32
}

/// SDO 应答 COB-ID
pub fn sdo_response_id(node: NodeId) -> u32 {
    ID_SDO_TX + node.get() as u32
}

// ============================================================================
// PDO 槽位
// ============================================================================

/// PDO 方向（相对驱动器而言）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdoDirection {
    /// 接收 PDO（RxPDO，主站 -> 驱动器）
    Rx,
    /// 发送 PDO（TxPDO，驱动器 -> 主站）
    Tx,
}

/// PDO 槽位编号（1~4）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotNumber {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl SlotNumber {
    pub const ALL: [SlotNumber; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// 0 起始的数组下标
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

/// PDO 槽位：(方向, 编号)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdoSlot {
    pub direction: PdoDirection,
    pub number: SlotNumber,
}

impl PdoSlot {
    pub const fn rx(number: SlotNumber) -> Self {
        Self {
            direction: PdoDirection::Rx,
            number,
        }
    }

    pub const fn tx(number: SlotNumber) -> Self {
        Self {
            direction: PdoDirection::Tx,
            number,
        }
    }

    /// 预定义连接集中的 COB-ID 基址
    pub fn base_id(self) -> u32 {
        match self.direction {
            PdoDirection::Rx => PDO_RX_BASE[self.number.index()],
            PdoDirection::Tx => PDO_TX_BASE[self.number.index()],
        }
    }

    /// 本节点该槽位的 COB-ID：`base_id + node_id`
    pub fn cob_id(self, node: NodeId) -> u32 {
        self.base_id() + node.get() as u32
    }

    /// 通讯参数对象索引
    pub fn comm_index(self) -> u16 {
        let offset = self.number.index() as u16;
        match self.direction {
            PdoDirection::Rx => OD_RX_PDO_COMM_BASE + offset,
            PdoDirection::Tx => OD_TX_PDO_COMM_BASE + offset,
        }
    }

    /// 映射参数对象索引
    pub fn mapping_index(self) -> u16 {
        let offset = self.number.index() as u16;
        match self.direction {
            PdoDirection::Rx => OD_RX_PDO_MAPPING_BASE + offset,
            PdoDirection::Tx => OD_TX_PDO_MAPPING_BASE + offset,
        }
    }

    /// 根据 CAN ID 反查本节点的发送 PDO 槽位
    pub fn tx_from_cob_id(id: u32, node: NodeId) -> Option<Self> {
        SlotNumber::ALL
            .into_iter()
            .map(Self::tx)
            .find(|slot| slot.cob_id(node) == id)
    }
}

impl fmt::Display for PdoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            PdoDirection::Rx => "RX",
            PdoDirection::Tx => "TX",
        };
        write!(f, "{}{}", dir, self.number as u8)
    }
}
