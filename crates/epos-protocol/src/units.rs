//! 物理单位换算
//!
//! 在物理量（mm/s、mm）与驱动器寄存器（rpm、编码器计数）之间换算。
//!
//! # 取整约定
//!
//! 所有换算都向零截断，不做四舍五入；往返换算存在有界误差，
//! 上界见 [`UnitConverter::round_trip_tolerance`]。

use std::f64::consts::PI;

/// 默认轮半径（mm）
pub const DEFAULT_WHEEL_RADIUS_MM: f64 = 50.0;

/// 默认减速比
pub const DEFAULT_GEAR_RATIO: f64 = 26.0;

/// 轮式底盘的单位换算器
///
/// 常量由机器人的机械结构决定，构建后不再改变。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitConverter {
    /// 轮半径（mm）
    pub wheel_radius_mm: f64,
    /// 减速比（电机转数 / 轮转数）
    pub gear_ratio: f64,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::new(DEFAULT_WHEEL_RADIUS_MM, DEFAULT_GEAR_RATIO)
    }
}

impl UnitConverter {
    pub const fn new(wheel_radius_mm: f64, gear_ratio: f64) -> Self {
        Self {
            wheel_radius_mm,
            gear_ratio,
        }
    }

    /// 轮周长（mm）
    #[inline]
    pub fn wheel_circumference_mm(&self) -> f64 {
        2.0 * self.wheel_radius_mm * PI
    }

    /// 电机每转一圈，轮子前进的距离（mm）
    #[inline]
    pub fn mm_per_rotation(&self) -> f64 {
        self.wheel_circumference_mm() / self.gear_ratio
    }

    /// mm/s -> rpm
    ///
    /// `(60 * speed) / mm_per_rotation`，向零截断
    pub fn mm_per_sec_to_rpm(&self, mm_per_sec: i32) -> i32 {
        let mm_per_min = 60.0 * mm_per_sec as f64;
        (mm_per_min / self.mm_per_rotation()) as i32
    }

    /// rpm -> mm/s
    ///
    /// 先截断得到 mm/min，再除以 60 后截断
    pub fn rpm_to_mm_per_sec(&self, rpm: i32) -> i32 {
        let mm_per_min = (rpm as f64 * self.mm_per_rotation()) as i32;
        (mm_per_min as f64 / 60.0) as i32
    }

    /// 编码器计数 -> mm
    ///
    /// `encoder_count * mm_per_rotation`，向零截断
    pub fn encoder_to_mm(&self, encoder_count: i32) -> i32 {
        (encoder_count as f64 * self.mm_per_rotation()) as i32
    }

    /// `rpm_to_mm_per_sec(mm_per_sec_to_rpm(v))` 与 `v` 的最大偏差（mm/s）
    ///
    /// rpm 截断最多损失 1 rpm（即 `mm_per_rotation / 60` mm/s），
    /// 两次后续截断各最多再损失 1。
    pub fn round_trip_tolerance(&self) -> i32 {
        (self.mm_per_rotation() / 60.0).ceil() as i32 + 2
    }
}
