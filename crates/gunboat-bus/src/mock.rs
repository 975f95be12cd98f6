//! Mock 总线
//!
//! 记录每一次寄存器写入；克隆体共享同一份记录，测试可以把一个克隆交给
//! 被测对象，用另一个克隆检查写入序列。

use crate::{BusError, RegisterBus};
use parking_lot::Mutex;
use std::sync::Arc;

/// 一次记录下的写入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWrite {
    Byte { register: u8, value: u8 },
    Word { register: u8, value: u16 },
}

#[derive(Debug, Default)]
struct MockState {
    writes: Vec<BusWrite>,
    /// 剩余多少次写入后开始失败（None 表示永不失败）
    fail_after: Option<usize>,
}

/// 记录型 Mock 总线
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 再成功 `count` 次写入后，后续写入全部返回 `BusError::Device`
    pub fn fail_after(&self, count: usize) {
        self.state.lock().fail_after = Some(count);
    }

    /// 全部写入的副本
    pub fn writes(&self) -> Vec<BusWrite> {
        self.state.lock().writes.clone()
    }

    /// 只取字写入的数值（输出锁存器序列）
    pub fn words(&self) -> Vec<u16> {
        self.state
            .lock()
            .writes
            .iter()
            .filter_map(|w| match *w {
                BusWrite::Word { value, .. } => Some(value),
                BusWrite::Byte { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().writes.clear();
    }

    fn record(&self, write: BusWrite) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(BusError::Device {
                    address: 0,
                    message: "injected failure".to_string(),
                });
            }
            *remaining -= 1;
        }
        state.writes.push(write);
        Ok(())
    }
}

impl RegisterBus for MockBus {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.record(BusWrite::Byte { register, value })
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<(), BusError> {
        self.record(BusWrite::Word { register, value })
    }
}
