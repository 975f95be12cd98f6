//! MCP23017 16 位 I/O 扩展芯片
//!
//! 每片芯片有两组 8 位端口（A/B），每组端口再按高低半字节各驱动一个
//! 四线步进电机，因此一片芯片最多驱动 4 个炮塔。输出锁存器按小端字写入：
//! 低字节为 `OLATA`，高字节为 `OLATB`。

use crate::{BusError, RegisterBus};
use tracing::{debug, trace};

/// 第 0 片芯片的 I2C 地址，第 n 片为 `BASE_ADDRESS + n`
pub const BASE_ADDRESS: u16 = 0x20;

/// 配置寄存器（IOCON.BANK = 0 时）
pub const IOCON: u8 = 0x0A;
/// 端口 A 方向寄存器，`IODIRB` 紧随其后
pub const IODIRA: u8 = 0x00;
/// 端口 A 输出锁存器
pub const OLATA: u8 = 0x14;
/// 端口 B 输出锁存器
pub const OLATB: u8 = 0x15;

/// IOCON 初始值：顺序寻址，中断脚开漏
pub const IOCON_INIT: u8 = 0x02;

/// 每片芯片的半字节端口数
pub const PORTS: usize = 4;

/// 芯片索引对应的总线地址
pub fn address(expander: u8) -> u16 {
    BASE_ADDRESS + expander as u16
}

/// 端口 A/B 与高低半字节组合为端口号（0..4）
///
/// 端口号 p 占用锁存字的第 `4p..4p+3` 位。
pub fn port_index(bank_b: bool, high_nibble: bool) -> u8 {
    (bank_b as u8) * 2 + high_nibble as u8
}

/// 单片 MCP23017
pub struct Mcp23017<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> Mcp23017<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// 上电初始化：全部引脚设为输出，并清零锁存器
    pub fn initialise(&mut self) -> Result<(), BusError> {
        self.bus.write_byte(IOCON, IOCON_INIT)?;
        self.bus.write_word(IODIRA, 0x0000)?;
        self.bus.write_word(OLATA, 0x0000)?;
        debug!("MCP23017 initialised (IOCON={:#04x}, all outputs)", IOCON_INIT);
        Ok(())
    }

    /// 一次事务写入全部 16 位输出
    pub fn write_latch(&mut self, word: u16) -> Result<(), BusError> {
        trace!("OLAT <- {:#06x}", word);
        self.bus.write_word(OLATA, word)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}
