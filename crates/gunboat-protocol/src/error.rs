//! 协议层错误类型定义

use thiserror::Error;

/// 船体装配配置错误
///
/// 在 `attach_boat` 阶段发现，属于致命错误（船体无法接入控制器）。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// 船体没有任何炮塔
    #[error("Boat has no guns; at least one turret is required for targeting")]
    NoGuns,

    /// 炮塔范围非法（min > max）
    #[error("Gun {index} has an invalid range [{min}, {max}]")]
    InvalidGunRange { index: usize, min: i32, max: i32 },

    /// 瞄准常量非法
    #[error("Invalid targeting constant `{name}`: {value}")]
    InvalidConstant { name: &'static str, value: f64 },
}

/// 船体命令错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoatError {
    /// 目标位置超出炮塔范围
    #[error("Position {position} is outside turret {gun} range [{min}, {max}]")]
    Range {
        gun: usize,
        position: i32,
        min: i32,
        max: i32,
    },

    /// 不存在的炮塔编号
    #[error("Unknown gun index {gun} (boat has {count} guns)")]
    UnknownGun { gun: usize, count: usize },

    /// 执行器故障（总线、PWM 等）
    #[error("Actuator fault: {0}")]
    Actuator(String),
}
