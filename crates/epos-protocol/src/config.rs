//! 配置通道帧（NMT / SDO）
//!
//! 配置通道只用于一次性的网络状态切换与对象字典写入，
//! 周期性数据走 PDO（见 `control` / `feedback`）。

use crate::ids::{CANOPEN_BROADCAST_ID, ID_NMT, NodeId, sdo_request_id, sdo_response_id};
use crate::{EposFrame, ProtocolError, bytes_to_u16_le, bytes_to_u32_le};
use std::fmt;

// ============================================================================
// NMT
// ============================================================================

/// NMT 模块控制命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtCommand {
    /// 进入 Operational（开启 PDO 通讯）
    StartNode = 0x01,
    /// 进入 Stopped
    StopNode = 0x02,
    /// 进入 Pre-Operational（只允许 SDO）
    EnterPreOperational = 0x80,
    ResetNode = 0x81,
    ResetCommunication = 0x82,
}

/// NMT 目标：单个节点或广播
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmtTarget {
    Broadcast,
    Node(NodeId),
}

impl NmtTarget {
    fn raw(self) -> u8 {
        match self {
            NmtTarget::Broadcast => CANOPEN_BROADCAST_ID,
            NmtTarget::Node(node) => node.get(),
        }
    }
}

/// NMT 帧：COB-ID 0x000，`[command, node_id]`
pub fn nmt_frame(target: NmtTarget, command: NmtCommand) -> EposFrame {
    EposFrame::new_standard(ID_NMT as u16, &[command as u8, target.raw()])
}

// ============================================================================
// 对象字典取值
// ============================================================================

/// 对象字典条目地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectEntry {
    pub index: u16,
    pub subindex: u8,
}

impl ObjectEntry {
    pub const fn new(index: u16, subindex: u8) -> Self {
        Self { index, subindex }
    }
}

impl fmt::Display for ObjectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}:{:02X}", self.index, self.subindex)
    }
}

/// 写入对象字典的值（决定 SDO 的数据长度）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
}

impl ObjectValue {
    /// 小端编码，返回 (4 字节缓冲, 有效长度)
    pub fn to_le_bytes(self) -> ([u8; 4], usize) {
        let mut buf = [0u8; 4];
        let len = match self {
            ObjectValue::U8(v) => {
                buf[0] = v;
                1
            },
            ObjectValue::I8(v) => {
                buf[0] = v as u8;
                1
            },
            ObjectValue::U16(v) => {
                buf[..2].copy_from_slice(&v.to_le_bytes());
                2
            },
            ObjectValue::I16(v) => {
                buf[..2].copy_from_slice(&v.to_le_bytes());
                2
            },
            ObjectValue::U32(v) => {
                buf.copy_from_slice(&v.to_le_bytes());
                4
            },
            ObjectValue::I32(v) => {
                buf.copy_from_slice(&v.to_le_bytes());
                4
            },
        };
        (buf, len)
    }
}

// ============================================================================
// SDO（加速传输 / expedited）
// ============================================================================

/// SDO 下载应答命令字
pub const SDO_DOWNLOAD_RESPONSE: u8 = 0x60;
/// SDO 中止命令字
pub const SDO_ABORT: u8 = 0x80;

/// 加速下载请求（主站 -> 驱动器）
///
/// 命令字：`0x23 | ((4 - n) << 2)`，n 为数据字节数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdoDownloadRequest {
    pub node: NodeId,
    pub entry: ObjectEntry,
    pub value: ObjectValue,
}

impl SdoDownloadRequest {
    pub fn new(node: NodeId, entry: ObjectEntry, value: ObjectValue) -> Self {
        Self { node, entry, value }
    }

    /// 转换为 CAN 帧（ID = 0x600 + node_id）
    pub fn to_frame(self) -> EposFrame {
        let (bytes, len) = self.value.to_le_bytes();
        let mut data = [0u8; 8];
        data[0] = 0x23 | (((4 - len) as u8) << 2);
        data[1..3].copy_from_slice(&self.entry.index.to_le_bytes());
        data[3] = self.entry.subindex;
        data[4..8].copy_from_slice(&bytes);

        EposFrame::new_standard(sdo_request_id(self.node) as u16, &data)
    }

    /// 从 CAN 帧解析（主要用于测试替身和总线监听）
    pub fn from_frame(frame: &EposFrame, node: NodeId) -> Result<Self, ProtocolError> {
        if frame.id != sdo_request_id(node) {
            return Err(ProtocolError::InvalidCanId { id: frame.id });
        }
        frame.require_len(8)?;

        let d = &frame.data;
        let command = d[0];
        // 0b001x_nn11：加速下载且指明长度
        if command & 0xE3 != 0x23 {
            return Err(ProtocolError::UnexpectedSdoResponse { command });
        }
        let len = 4 - ((command >> 2) & 0x03) as usize;
        let value = match len {
            1 => ObjectValue::U8(d[4]),
            2 => ObjectValue::U16(bytes_to_u16_le([d[4], d[5]])),
            _ => ObjectValue::U32(bytes_to_u32_le([d[4], d[5], d[6], d[7]])),
        };
        Ok(Self {
            node,
            entry: ObjectEntry::new(bytes_to_u16_le([d[1], d[2]]), d[3]),
            value,
        })
    }
}

/// SDO 应答（驱动器 -> 主站）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdoResponse {
    /// 下载成功
    DownloadAck { entry: ObjectEntry },
    /// 传输中止
    Abort { entry: ObjectEntry, code: u32 },
}

impl SdoResponse {
    /// 从 CAN 帧解析
    ///
    /// # 错误
    /// - `ProtocolError::InvalidCanId`: 不是本节点的 SDO 应答
    /// - `ProtocolError::UnexpectedSdoResponse`: 命令字不是下载应答/中止
    pub fn from_frame(frame: &EposFrame, node: NodeId) -> Result<Self, ProtocolError> {
        if frame.id != sdo_response_id(node) {
            return Err(ProtocolError::InvalidCanId { id: frame.id });
        }
        frame.require_len(4)?;

        let d = &frame.data;
        let entry = ObjectEntry::new(bytes_to_u16_le([d[1], d[2]]), d[3]);
        match d[0] {
            SDO_DOWNLOAD_RESPONSE => Ok(SdoResponse::DownloadAck { entry }),
            SDO_ABORT => {
                frame.require_len(8)?;
                Ok(SdoResponse::Abort {
                    entry,
                    code: bytes_to_u32_le([d[4], d[5], d[6], d[7]]),
                })
            },
            command => Err(ProtocolError::UnexpectedSdoResponse { command }),
        }
    }

    /// 应答对应的对象
    pub fn entry(&self) -> ObjectEntry {
        match *self {
            SdoResponse::DownloadAck { entry } | SdoResponse::Abort { entry, .. } => entry,
        }
    }

    /// 构建应答帧（驱动器侧，用于测试替身）
    pub fn to_frame(self, node: NodeId) -> EposFrame {
        let entry = self.entry();
        let mut data = [0u8; 8];
        data[1..3].copy_from_slice(&entry.index.to_le_bytes());
        data[3] = entry.subindex;
        match self {
            SdoResponse::DownloadAck { .. } => data[0] = SDO_DOWNLOAD_RESPONSE,
            SdoResponse::Abort { code, .. } => {
                data[0] = SDO_ABORT;
                data[4..8].copy_from_slice(&code.to_le_bytes());
            },
        }
        EposFrame::new_standard(sdo_response_id(node) as u16, &data)
    }
}
