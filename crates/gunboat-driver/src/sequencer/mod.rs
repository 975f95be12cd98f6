//! 步进时序器
//!
//! 把"从 start 走到 stop"的请求展开为有序相位，并串行写入扩展芯片。
//! 一片芯片有 4 个半字节端口，端口 p 占用锁存字第 `4p..4p+3` 位。
//!
//! # 两种实现
//!
//! - [`BufferedSequencer`]：每个端口一个队列，后台排空线程每个周期从每个端口
//!   各取至多一个相位，拼成一个字一次写出，多个炮塔可同时转动
//! - [`DirectSequencer`]：调用线程直接写出每个相位，总线事务由锁串行化
//!
//! # 停止握手
//!
//! `request_stop()` 后拒绝新步进（[`DriverError::Stopping`]），
//! `wait_for_stop()` 阻塞到所有队列排空且已写出最后一次全关。

mod buffered;
mod direct;

pub use buffered::BufferedSequencer;
pub use direct::DirectSequencer;

use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use gunboat_bus::mcp23017::{self, PORTS};
use std::time::Duration;

/// 扩展芯片上的半字节端口（0..4）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u8);

impl Port {
    pub fn new(index: u8) -> Result<Self, DriverError> {
        if (index as usize) < PORTS {
            Ok(Self(index))
        } else {
            Err(DriverError::InvalidPort(index))
        }
    }

    /// 由端口 A/B 与高低半字节确定
    pub fn from_bank(bank_b: bool, high_nibble: bool) -> Self {
        Self(mcp23017::port_index(bank_b, high_nibble))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// 该端口在锁存字中的位移
    pub fn shift(self) -> u32 {
        self.0 as u32 * 4
    }

    /// 该端口在锁存字中的掩码
    pub fn mask(self) -> u16 {
        0x000F << self.shift()
    }

    /// 把相位放到本端口的半字节
    pub fn place(self, phase: u8) -> u16 {
        ((phase & 0x0F) as u16) << self.shift()
    }
}

/// 时序器模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum SequencerMode {
    /// 后台线程排空队列
    #[default]
    Buffered,
    /// 调用线程直接写出
    Direct,
}

/// 时序器配置
///
/// # Example
///
/// ```
/// use gunboat_driver::{SequencerConfig, SequencerMode};
///
/// // 默认：缓冲模式，相间延时 50ms
/// let config = SequencerConfig::default();
/// assert_eq!(config.period_ms, 50);
///
/// let fast = SequencerConfig { period_ms: 5, mode: SequencerMode::Direct };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SequencerConfig {
    /// 相间延时（毫秒），即步进周期
    pub period_ms: u64,
    pub mode: SequencerMode,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            period_ms: 50,
            mode: SequencerMode::Buffered,
        }
    }
}

impl SequencerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// 步进时序器
///
/// 同一芯片上的所有炮塔共享一个实例。
pub trait ActuatorSequencer: Send + Sync {
    /// 从 `start` 走到 `stop`（含两端），每步一个相位
    fn add_cycles(&self, port: Port, start: i32, stop: i32) -> Result<(), DriverError>;

    /// 进入停止流程，之后的 `add_cycles` 返回 [`DriverError::Stopping`]
    fn request_stop(&self);

    /// 阻塞到全部相位写出且线圈全部断电
    ///
    /// 未调用 `request_stop` 时会先隐式请求停止。可重复调用。
    fn wait_for_stop(&self) -> Result<(), DriverError>;

    fn is_stopping(&self) -> bool;

    fn metrics(&self) -> MetricsSnapshot;
}
