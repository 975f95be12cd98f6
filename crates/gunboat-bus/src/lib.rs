//! 寄存器总线抽象层
//!
//! 提供对 I/O 扩展芯片寄存器的最小写接口，上层（步进时序器）只依赖
//! [`RegisterBus`]，不关心底层是 Linux i2c-dev 还是测试用的 Mock。
//!
//! # 后端
//!
//! - `i2cdev`: Linux `/dev/i2c-N`（仅 Linux 编译）
//! - `mock`: 记录所有写入，可注入故障，用于测试与无硬件仿真

use thiserror::Error;

pub mod mcp23017;
pub mod mock;

#[cfg(target_os = "linux")]
pub mod i2cdev;

pub use mcp23017::Mcp23017;
pub use mock::{BusWrite, MockBus};

#[cfg(target_os = "linux")]
pub use i2cdev::I2cDevBus;

/// 总线错误
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 设备拒绝访问或地址无应答
    #[error("Device error at address {address:#04x}: {message}")]
    Device { address: u16, message: String },

    /// 总线已关闭
    #[error("Bus closed")]
    Closed,
}

/// 寄存器总线
///
/// 每次调用对应一次完整的总线事务。字（16 位）按小端写入：
/// 低字节写入 `register`，高字节写入 `register + 1`。
pub trait RegisterBus: Send {
    /// 写单字节寄存器
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError>;

    /// 写 16 位寄存器对
    fn write_word(&mut self, register: u8, value: u16) -> Result<(), BusError>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        (**self).write_byte(register, value)
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<(), BusError> {
        (**self).write_word(register, value)
    }
}
