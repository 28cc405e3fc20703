//! 控制帧结构体定义
//!
//! 包含控制字命令、运行模式等枚举，以及 RxPDO1（控制字 + 电流设定值）
//! 控制帧的构建方法。

use crate::ids::{NodeId, PdoSlot, SlotNumber};
use crate::{EposFrame, ProtocolError, i16_to_bytes_le, u16_to_bytes_le};
use num_enum::{IntoPrimitive, TryFromPrimitive};

// ============================================================================
// 控制字
// ============================================================================

/// 控制字命令（CiA-402 设备状态机转换）
///
/// 每个命令对应一个固定的 16 位控制字。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlwordCommand {
    /// Switch On Disabled -> Ready To Switch On
    Shutdown,
    /// Ready To Switch On -> Switched On
    SwitchOn,
    /// Switched On -> Operation Enabled（一步完成）
    SwitchOnAndEnableOperation,
    /// 任意状态 -> Switch On Disabled（断开功率级）
    DisableVoltage,
    /// Operation Enabled -> Quick Stop Active
    Quickstop,
    /// Operation Enabled -> Switched On
    DisableOperation,
    /// Fault -> Switch On Disabled（上升沿有效）
    FaultReset,
}

impl ControlwordCommand {
    /// 命令对应的控制字
    pub const fn word(self) -> u16 {
        match self {
            Self::Shutdown => 0x0006,
            Self::SwitchOn => 0x0007,
            Self::SwitchOnAndEnableOperation => 0x000F,
            Self::DisableVoltage => 0x0000,
            Self::Quickstop => 0x0002,
            Self::DisableOperation => 0x0007,
            Self::FaultReset => 0x0080,
        }
    }
}

impl From<ControlwordCommand> for u16 {
    fn from(cmd: ControlwordCommand) -> Self {
        cmd.word()
    }
}

// ============================================================================
// 运行模式
// ============================================================================

/// 运行模式（对象 0x6060，有符号 8 位）
///
/// 负值为 EPOS 厂商自定义模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i8)]
pub enum OperationMode {
    /// 轮廓位置模式
    ProfilePosition = 1,
    /// 轮廓速度模式
    ProfileVelocity = 3,
    /// 回零模式
    Homing = 6,
    /// 位置模式
    Position = -1,
    /// 速度模式
    Velocity = -2,
    /// 电流模式（初始化后的默认模式）
    #[default]
    Current = -3,
    /// 诊断模式
    Diagnostic = -4,
    /// 主编码器模式
    MasterEncoder = -5,
    /// 脉冲方向模式
    StepDirection = -6,
}

impl OperationMode {
    /// 从对象字典中的原始字节解析
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        Self::try_from(raw as i8).map_err(|_| ProtocolError::InvalidValue {
            field: "OperationMode".to_string(),
            value: raw as i8 as i64,
        })
    }

    /// 写入对象字典时使用的原始字节
    pub fn raw(self) -> u8 {
        i8::from(self) as u8
    }
}

// ============================================================================
// 运动参数
// ============================================================================

/// 运动轮廓类型（对象 0x6086）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(i16)]
pub enum MotionProfileType {
    /// 梯形（线性斜坡）
    #[default]
    Trapezoidal = 0,
    /// 正弦平方斜坡
    Sinusoidal = 1,
}

/// 位置传感器测量方式（杂项配置 0x2008）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorConfiguration {
    /// 按采样周期内的编码器脉冲数计算速度
    PulseCount,
    /// 通过检测编码器脉冲时间精确测量电机速度（bit 3）
    #[default]
    EncoderPulseTime,
}

impl SensorConfiguration {
    /// 杂项配置寄存器取值
    pub const fn bits(self) -> u16 {
        match self {
            Self::PulseCount => 0x0000,
            Self::EncoderPulseTime => 1 << 3,
        }
    }
}

// ============================================================================
// RxPDO1：控制字 + 电流设定值
// ============================================================================

/// 电流指令帧（RxPDO1）
///
/// 布局（小端）：
/// - Byte 0-1: 控制字
/// - Byte 2-3: 电流设定值（mA，有符号）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCommandFrame {
    pub controlword: ControlwordCommand,
    pub current_ma: i16,
}

impl CurrentCommandFrame {
    pub fn new(controlword: ControlwordCommand, current_ma: i16) -> Self {
        Self {
            controlword,
            current_ma,
        }
    }

    /// 转换为 CAN 帧（ID = RX1 基址 + node_id）
    pub fn to_frame(self, node: NodeId) -> EposFrame {
        let mut data = [0u8; 4];
        data[0..2].copy_from_slice(&u16_to_bytes_le(self.controlword.word()));
        data[2..4].copy_from_slice(&i16_to_bytes_le(self.current_ma));

        let id = PdoSlot::rx(SlotNumber::One).cob_id(node);
        EposFrame::new_standard(id as u16, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controlword_patterns() {
        assert_eq!(ControlwordCommand::Shutdown.word(), 0x0006);
        assert_eq!(ControlwordCommand::SwitchOnAndEnableOperation.word(), 0x000F);
        assert_eq!(ControlwordCommand::DisableVoltage.word(), 0x0000);
        assert_eq!(ControlwordCommand::Quickstop.word(), 0x0002);
        assert_eq!(ControlwordCommand::FaultReset.word(), 0x0080);
        assert_eq!(u16::from(ControlwordCommand::SwitchOn), 0x0007);
    }

    #[test]
    fn test_operation_mode_raw() {
        assert_eq!(OperationMode::Current.raw(), 0xFD);
        assert_eq!(OperationMode::Position.raw(), 0xFF);
        assert_eq!(OperationMode::ProfileVelocity.raw(), 0x03);
        assert_eq!(OperationMode::from_raw(0xFD).unwrap(), OperationMode::Current);
        assert_eq!(OperationMode::from_raw(0x06).unwrap(), OperationMode::Homing);
        assert!(OperationMode::from_raw(0x02).is_err());
    }

    #[test]
    fn test_operation_mode_default_is_current() {
        assert_eq!(OperationMode::default(), OperationMode::Current);
    }

    #[test]
    fn test_sensor_configuration_bits() {
        assert_eq!(SensorConfiguration::EncoderPulseTime.bits(), 0x0008);
        assert_eq!(SensorConfiguration::PulseCount.bits(), 0x0000);
    }

    #[test]
    fn test_current_command_frame() {
        let node = NodeId::new(1).unwrap();
        let frame =
            CurrentCommandFrame::new(ControlwordCommand::SwitchOnAndEnableOperation, 250)
                .to_frame(node);

        assert_eq!(frame.id, 0x201);
        assert_eq!(frame.len, 4);
        assert_eq!(frame.data_slice(), &[0x0F, 0x00, 0xFA, 0x00]);
    }

    #[test]
    fn test_current_command_frame_negative() {
        let node = NodeId::new(3).unwrap();
        let frame =
            CurrentCommandFrame::new(ControlwordCommand::SwitchOnAndEnableOperation, -250)
                .to_frame(node);

        assert_eq!(frame.id, 0x203);
        assert_eq!(frame.data_slice(), &[0x0F, 0x00, 0x06, 0xFF]);
    }
}
