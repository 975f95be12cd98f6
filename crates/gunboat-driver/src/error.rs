//! 驱动层错误类型定义

use gunboat_bus::BusError;
use gunboat_protocol::BoatError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 总线错误
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 目标位置超出炮塔范围，炮塔位置保持不变
    #[error("Position {position} out of range [{min}, {max}]")]
    OutOfRange { position: i32, min: i32, max: i32 },

    /// 时序器正在停止，拒绝新的步进
    #[error("Sequencer is stopping; new steps are rejected")]
    Stopping,

    /// 端口号超出 0..4
    #[error("Invalid expander port {0} (expected 0..4)")]
    InvalidPort(u8),

    /// 相位通道已关闭（排空线程退出）
    #[error("Phase channel closed")]
    ChannelClosed,

    /// 排空线程错误
    #[error("Drain thread error: {0}")]
    IoThread(String),

    /// 装配配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DriverError {
    /// 转换为船体错误，越界错误保留炮塔编号
    pub fn into_boat_error(self, gun: usize) -> BoatError {
        match self {
            DriverError::OutOfRange { position, min, max } => BoatError::Range {
                gun,
                position,
                min,
                max,
            },
            other => BoatError::Actuator(other.to_string()),
        }
    }
}
