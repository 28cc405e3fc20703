//! 节点状态：生命周期、反馈样本、多步操作的结果记录

use crate::error::DriverError;
use epos_protocol::{TxPdo, UnitConverter};
use smallvec::SmallVec;
use tracing::warn;

/// 设备生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// 通道已关闭
    #[default]
    Closed,
    /// NMT Pre-Operational，映射尚未写完
    PreOperational,
    /// 已配置，功率级未使能
    OperationalDisabled,
    /// 已使能，可以下发电流/位置指令
    OperationalEnabled,
    /// 驱动器报告故障
    Fault,
}

/// 反馈样本
///
/// 部分更新：每帧只刷新自己携带的字段，其余字段保持上一次的值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedbackSample {
    /// 实际位置（编码器计数）
    pub position_raw: i32,
    /// 实际速度（mm/s）
    pub velocity_mm_s: i32,
    /// 实际电流（mA）
    pub current_ma: i16,
}

impl FeedbackSample {
    /// 用一帧 TxPDO 更新对应字段，返回是否有字段被更新
    pub fn apply(&mut self, pdo: &TxPdo, converter: &UnitConverter) -> bool {
        match *pdo {
            TxPdo::Current { current_ma, .. } => {
                self.current_ma = current_ma;
                true
            },
            TxPdo::Position { position_raw, .. } => {
                self.position_raw = position_raw;
                true
            },
            TxPdo::Velocity { velocity_rpm, .. } => {
                self.velocity_mm_s = converter.rpm_to_mm_per_sec(velocity_rpm);
                true
            },
            TxPdo::Status { .. } | TxPdo::Unknown { .. } => false,
        }
    }

    /// 实际位置换算为 mm
    pub fn position_mm(&self, converter: &UnitConverter) -> i32 {
        converter.encoder_to_mm(self.position_raw)
    }
}

/// 多步操作（enable/disable/halt）的逐步结果
///
/// 每一步都会执行，失败只记录；最终按"第一个错误"上报。
#[derive(Debug, Default)]
pub struct StepReport {
    steps: SmallVec<[(&'static str, Result<(), DriverError>); 4]>,
}

impl StepReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一步的结果
    pub fn record(&mut self, step: &'static str, result: Result<(), DriverError>) {
        if let Err(e) = &result {
            warn!("Step '{}' failed: {}", step, e);
        }
        self.steps.push((step, result));
    }

    /// 按执行顺序的步骤名
    pub fn step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|(name, _)| *name)
    }

    /// 失败的步骤数
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn is_ok(&self) -> bool {
        self.failures() == 0
    }

    /// 第一个错误胜出
    pub fn into_result(self) -> Result<(), DriverError> {
        self.steps
            .into_iter()
            .map(|(_, result)| result)
            .find(Result::is_err)
            .unwrap_or(Ok(()))
    }
}
