//! 集成测试公共设施：模拟 EPOS 驱动器
//!
//! 配置总线上挂一个 responder，对每个 SDO 下载请求应答 0x60，
//! 命中 `abort_on` 规则的请求应答 0x80。

#![allow(dead_code)]

use epos_can::mock::MockCanAdapter;
use epos_driver::{DriverError, EposConfig, EposNode};
use epos_protocol::{
    EposFrame, NodeId, ObjectEntry, ObjectValue, SdoDownloadRequest, SdoResponse,
};
use std::sync::{Arc, Mutex};

pub const NODE: u8 = 1;

pub type MockNode = EposNode<MockCanAdapter, MockCanAdapter>;

pub fn node_id() -> NodeId {
    NodeId::new(NODE).unwrap()
}

/// 中止规则：(对象, 可选的值)
type AbortRule = (ObjectEntry, Option<ObjectValue>);

/// 模拟驱动器
#[derive(Clone, Default)]
pub struct SimulatedDrive {
    pub pdo_bus: MockCanAdapter,
    pub cfg_bus: MockCanAdapter,
    abort_rules: Arc<Mutex<Vec<AbortRule>>>,
}

impl SimulatedDrive {
    pub fn new() -> Self {
        let drive = Self::default();
        let rules = drive.abort_rules.clone();
        let node = node_id();
        drive.cfg_bus.set_responder(move |frame| {
            let Ok(request) = SdoDownloadRequest::from_frame(frame, node) else {
                return Vec::new();
            };
            let abort = rules.lock().unwrap().iter().any(|(entry, value)| {
                *entry == request.entry && value.is_none_or(|v| v == request.value)
            });
            let response = if abort {
                SdoResponse::Abort {
                    entry: request.entry,
                    code: 0x0800_0000,
                }
            } else {
                SdoResponse::DownloadAck {
                    entry: request.entry,
                }
            };
            vec![response.to_frame(node)]
        });
        drive
    }

    /// 对某个对象的写入应答 abort（`value` 为 `None` 时不看取值）
    pub fn abort_on(&self, entry: ObjectEntry, value: Option<ObjectValue>) {
        self.abort_rules.lock().unwrap().push((entry, value));
    }

    pub fn clear_aborts(&self) {
        self.abort_rules.lock().unwrap().clear();
    }

    /// 初始化一个节点
    pub fn init(&self) -> Result<MockNode, DriverError> {
        EposNode::init(self.pdo_bus.clone(), self.cfg_bus.clone(), &EposConfig::default())
    }

    /// 初始化并清空配置总线的发送记录
    pub fn init_quiet(&self) -> MockNode {
        let node = self.init().unwrap();
        self.cfg_bus.take_sent();
        node
    }

    /// 驱动器发出一帧 TxPDO
    pub fn emit(&self, id: u16, data: &[u8]) {
        self.pdo_bus.push_rx(EposFrame::new_standard(id, data));
    }
}

/// 配置总线上的一帧，解码为可比较的形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFrame {
    Nmt { command: u8, node: u8 },
    Sdo { entry: ObjectEntry, value: ObjectValue },
    Other(u32),
}

pub fn decode_config_frames(frames: &[EposFrame]) -> Vec<ConfigFrame> {
    frames
        .iter()
        .map(|frame| {
            if frame.id == 0x000 {
                ConfigFrame::Nmt {
                    command: frame.data[0],
                    node: frame.data[1],
                }
            } else if let Ok(req) = SdoDownloadRequest::from_frame(frame, node_id()) {
                ConfigFrame::Sdo {
                    entry: req.entry,
                    value: req.value,
                }
            } else {
                ConfigFrame::Other(frame.id)
            }
        })
        .collect()
}

pub fn sdo(index: u16, subindex: u8, value: ObjectValue) -> ConfigFrame {
    ConfigFrame::Sdo {
        entry: ObjectEntry::new(index, subindex),
        value,
    }
}

pub fn nmt(command: u8) -> ConfigFrame {
    ConfigFrame::Nmt { command, node: 0 }
}
