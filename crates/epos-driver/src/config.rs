//! 节点配置（TOML）
//!
//! ```toml
//! interface = "can0"
//! node_id = 1
//! sdo_timeout_ms = 500
//!
//! [profile]
//! max_velocity = 100
//! quickstop_deceleration = 10000
//! profile_acceleration = 10000
//! profile_deceleration = 10000
//! motion_profile_type = "trapezoidal"
//! sensor_configuration = "encoder_pulse_time"
//!
//! [geometry]
//! wheel_radius_mm = 50.0
//! gear_ratio = 26.0
//! ```
//!
//! 所有字段都有默认值，配置文件只需写出要覆盖的部分。

use crate::sdo::DEFAULT_SDO_TIMEOUT;
use epos_protocol::{MotionProfileType, NodeId, SensorConfiguration, UnitConverter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 运动参数（初始化时通过 SDO 写入驱动器）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// 最大轮廓速度（rpm，0x607F）
    pub max_velocity: u32,
    /// 快停减速度（rpm/s，0x6085）
    pub quickstop_deceleration: u32,
    /// 轮廓加速度（rpm/s，0x6083）
    pub profile_acceleration: u32,
    /// 轮廓减速度（rpm/s，0x6084）
    pub profile_deceleration: u32,
    pub motion_profile_type: MotionProfileType,
    pub sensor_configuration: SensorConfiguration,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_velocity: 100,
            quickstop_deceleration: 10_000,
            profile_acceleration: 10_000,
            profile_deceleration: 10_000,
            motion_profile_type: MotionProfileType::Trapezoidal,
            sensor_configuration: SensorConfiguration::EncoderPulseTime,
        }
    }
}

/// 单个 EPOS 节点的完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EposConfig {
    /// SocketCAN 接口名
    pub interface: String,
    /// CANopen 节点 ID（1~127）
    pub node_id: u8,
    /// 等待 SDO 应答的超时
    pub sdo_timeout_ms: u64,
    pub profile: ProfileConfig,
    pub geometry: UnitConverter,
}

impl Default for EposConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            node_id: 1,
            sdo_timeout_ms: DEFAULT_SDO_TIMEOUT.as_millis() as u64,
            profile: ProfileConfig::default(),
            geometry: UnitConverter::default(),
        }
    }
}

impl EposConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EposConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node()?;
        if self.sdo_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sdo_timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.geometry.wheel_radius_mm.is_nan() || self.geometry.wheel_radius_mm <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "geometry.wheel_radius_mm",
                reason: format!("must be positive, got {}", self.geometry.wheel_radius_mm),
            });
        }
        if self.geometry.gear_ratio.is_nan() || self.geometry.gear_ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "geometry.gear_ratio",
                reason: format!("must be positive, got {}", self.geometry.gear_ratio),
            });
        }
        Ok(())
    }

    /// 校验后的节点 ID
    pub fn node(&self) -> Result<NodeId, ConfigError> {
        NodeId::new(self.node_id).map_err(|_| ConfigError::Invalid {
            field: "node_id",
            reason: format!("{} is outside 1..=127", self.node_id),
        })
    }

    pub fn sdo_timeout(&self) -> Duration {
        Duration::from_millis(self.sdo_timeout_ms)
    }
}
