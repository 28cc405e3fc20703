//! EPOS 节点：生命周期管理 + 电流模式接口
//!
//! 状态机：
//!
//! ```text
//!            init                 enable
//! (none) ──────────► Disabled ─────────────► Enabled
//!                       ▲  ◄───────────────────┘
//!                       │     disable / halt
//!           fault_reset │
//!                       └──────── Fault ◄──── read_feedback 报告故障
//! ```
//!
//! 每个节点独占两个通道：过程数据（PDO）与配置（NMT/SDO）。
//! 节点不做内部同步，多线程使用时需要外部加锁。

use crate::config::EposConfig;
use crate::configurator::configure_node;
use crate::error::DriverError;
use crate::process_data::PdoChannel;
use crate::sdo::{NetworkManagement, ObjectDictionary, SdoClient};
use crate::state::{FeedbackSample, LifecycleState, StepReport};
use epos_can::{CanAdapter, ReceiveTimeout};
use epos_protocol::{
    ControlwordCommand, NmtCommand, NmtTarget, NodeId, OD_CONTROLWORD, OD_MODES_OF_OPERATION,
    ObjectEntry, ObjectValue, OperationMode, UnitConverter,
};
use tracing::{debug, error, info};

/// 单个 EPOS 驱动器
///
/// 只能通过 [`EposNode::init`] 构造：拿到节点即说明 PDO 映射已写入，
/// 过程数据可以安全收发。
#[derive(Debug)]
pub struct EposNode<P: CanAdapter, C: CanAdapter> {
    pdo: PdoChannel<P>,
    sdo: SdoClient<C>,
    node: NodeId,
    converter: UnitConverter,
    state: LifecycleState,
    mode: OperationMode,
}

impl<P: CanAdapter, C: CanAdapter> EposNode<P, C> {
    /// 初始化节点
    ///
    /// 1. NMT 广播 Enter Pre-Operational
    /// 2. 写运动参数、PDO 通讯参数、PDO 映射
    /// 3. 切换到默认的电流模式
    /// 4. 丢弃 PDO 通道中配置完成前收到的帧
    ///
    /// 任意一步失败都不会产生节点，调用方无法继续下发运动指令。
    pub fn init(pdo: P, cfg: C, config: &EposConfig) -> Result<Self, DriverError> {
        let node =
            NodeId::new(config.node_id).map_err(|_| DriverError::InvalidNodeId(config.node_id))?;
        config.validate()?;

        let mut sdo = SdoClient::with_timeout(cfg, config.sdo_timeout());

        sdo.change_state(NmtTarget::Broadcast, NmtCommand::EnterPreOperational)
            .inspect_err(|e| error!("Failed to enter pre-operational: {}", e))?;
        info!("Node {} -> {:?}", node, LifecycleState::PreOperational);

        configure_node(&mut sdo, node, &config.profile)
            .inspect_err(|e| error!("Failed to configure node {}: {}", node, e))?;

        let mut epos = Self {
            pdo: PdoChannel::new(pdo, node),
            sdo,
            node,
            converter: config.geometry,
            state: LifecycleState::PreOperational,
            mode: OperationMode::default(),
        };
        epos.set_mode(OperationMode::default())?;

        // 配置完成前收到的 TxPDO 属于旧映射或上一次会话
        let stale = epos.pdo.discard_pending()?;
        if stale > 0 {
            debug!("Node {}: dropped {} PDO frame(s) received before configuration", node, stale);
        }
        epos.transition(LifecycleState::OperationalDisabled);
        Ok(epos)
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 最近一次成功设置的运行模式
    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn converter(&self) -> &UnitConverter {
        &self.converter
    }

    pub fn pdo_channel(&self) -> &PdoChannel<P> {
        &self.pdo
    }

    /// 配置通道（直接读写对象字典）
    pub fn sdo(&mut self) -> &mut SdoClient<C> {
        &mut self.sdo
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            info!("Node {}: {:?} -> {:?}", self.node, self.state, next);
            self.state = next;
        }
    }

    fn nmt(&mut self, command: NmtCommand) -> Result<(), DriverError> {
        self.sdo.change_state(NmtTarget::Broadcast, command)
    }

    fn controlword(&mut self, command: ControlwordCommand) -> Result<(), DriverError> {
        let entry = ObjectEntry::new(OD_CONTROLWORD, 0x00);
        self.sdo
            .write(self.node, entry, ObjectValue::U16(command.word()))
            .map_err(|e| e.writing(entry))
    }

    /// 使能：Pre-Operational → Shutdown → Switch On & Enable → Start Node
    ///
    /// 所有步骤都会执行；任一步失败则返回第一个错误，状态不变。
    pub fn enable(&mut self) -> Result<(), DriverError> {
        if self.state == LifecycleState::Fault {
            return Err(DriverError::InvalidState {
                operation: "enable",
                state: self.state,
            });
        }

        let mut report = StepReport::new();
        report.record("enter_pre_operational", self.nmt(NmtCommand::EnterPreOperational));
        report.record("shutdown", self.controlword(ControlwordCommand::Shutdown));
        report.record(
            "switch_on_and_enable",
            self.controlword(ControlwordCommand::SwitchOnAndEnableOperation),
        );
        report.record("start_node", self.nmt(NmtCommand::StartNode));

        report.into_result()?;
        self.transition(LifecycleState::OperationalEnabled);
        Ok(())
    }

    /// 失能：Pre-Operational → Disable Voltage → Stop Node
    pub fn disable(&mut self) -> Result<(), DriverError> {
        self.stop_with(ControlwordCommand::DisableVoltage)
    }

    /// 快停：Pre-Operational → Quickstop → Stop Node
    pub fn halt(&mut self) -> Result<(), DriverError> {
        self.stop_with(ControlwordCommand::Quickstop)
    }

    /// 无论步骤成败都离开使能状态，之后不再接受电流指令
    fn stop_with(&mut self, command: ControlwordCommand) -> Result<(), DriverError> {
        let mut report = StepReport::new();
        report.record("enter_pre_operational", self.nmt(NmtCommand::EnterPreOperational));
        report.record("controlword", self.controlword(command));
        report.record("stop_node", self.nmt(NmtCommand::StopNode));

        if self.state != LifecycleState::Fault {
            self.transition(LifecycleState::OperationalDisabled);
        }
        report.into_result()
    }

    /// 故障复位（控制字 bit 7）
    pub fn fault_reset(&mut self) -> Result<(), DriverError> {
        self.controlword(ControlwordCommand::FaultReset)?;
        if self.state == LifecycleState::Fault {
            self.transition(LifecycleState::OperationalDisabled);
        }
        Ok(())
    }

    /// 写运行模式（0x6060），使能后生效
    pub fn set_mode(&mut self, mode: OperationMode) -> Result<(), DriverError> {
        let entry = ObjectEntry::new(OD_MODES_OF_OPERATION, 0x00);
        self.sdo
            .write(self.node, entry, ObjectValue::I8(mode.into()))
            .map_err(|e| e.writing(entry))?;
        self.mode = mode;
        Ok(())
    }

    /// 电流设定（mA），只在使能状态下允许
    pub fn set_current(&mut self, milliamps: i16) -> Result<(), DriverError> {
        if self.state != LifecycleState::OperationalEnabled {
            return Err(DriverError::InvalidState {
                operation: "set_current",
                state: self.state,
            });
        }
        self.pdo
            .transmit(ControlwordCommand::SwitchOnAndEnableOperation, milliamps)
    }

    /// 电流归零
    pub fn stop_current(&mut self) -> Result<(), DriverError> {
        self.set_current(0)
    }

    /// 读取一帧反馈并更新 `sample` 中对应的字段
    ///
    /// 驱动器报告故障时节点进入 `Fault`，需要 `fault_reset` 后才能再次使能。
    pub fn read_feedback(
        &mut self,
        sample: &mut FeedbackSample,
        timeout: ReceiveTimeout,
    ) -> Result<(), DriverError> {
        match self.pdo.read_into(sample, &self.converter, timeout) {
            Ok(_) => Ok(()),
            Err(e @ DriverError::DeviceFault { .. }) => {
                self.transition(LifecycleState::Fault);
                Err(e)
            },
            Err(e) => Err(e),
        }
    }

    /// 关闭两个通道（适配器随节点一起释放）
    pub fn close(mut self) {
        self.transition(LifecycleState::Closed);
    }
}
