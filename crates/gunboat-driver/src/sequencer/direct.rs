//! 直写时序器
//!
//! 没有后台线程：调用线程逐个写出相位并在相间休眠。每次总线事务持锁，
//! 通过影子字保留其他端口的半字节，因此并发转动的炮塔互不干扰。
//! 一次移动结束后本端口半字节清零。
//!
//! 每次移动在整个过程中持有 `moves` 读锁，`wait_for_stop` 取写锁，
//! 因此返回前所有进行中的移动都已结束，最后的全关之后不再有相位写出。

use super::{ActuatorSequencer, Port};
use crate::error::DriverError;
use crate::metrics::{MetricsSnapshot, SequencerMetrics};
use crate::phase::phase_path;
use gunboat_bus::{Mcp23017, RegisterBus};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace};

struct DirectState<B: RegisterBus> {
    chip: Mcp23017<B>,
    /// 最近一次写出的锁存字
    shadow: u16,
}

/// 直写时序器
pub struct DirectSequencer<B: RegisterBus> {
    expander: u8,
    state: Mutex<DirectState<B>>,
    moves: RwLock<()>,
    stopping: AtomicBool,
    metrics: SequencerMetrics,
    period: Duration,
}

impl<B: RegisterBus> DirectSequencer<B> {
    /// 初始化芯片
    pub fn new(expander: u8, bus: B, period: Duration) -> Result<Self, DriverError> {
        let mut chip = Mcp23017::new(bus);
        chip.initialise()?;
        debug!(
            "Expander {} direct sequencer ready (period {:?})",
            expander, period
        );
        Ok(Self {
            expander,
            state: Mutex::new(DirectState { chip, shadow: 0 }),
            moves: RwLock::new(()),
            stopping: AtomicBool::new(false),
            metrics: SequencerMetrics::default(),
            period,
        })
    }

    /// 修改一个端口的半字节并写出（单次总线事务）
    fn write_nibble(&self, port: Port, phase: u8) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let word = (state.shadow & !port.mask()) | port.place(phase);
        if let Err(e) = state.chip.write_latch(word) {
            self.metrics.bus_errors.fetch_add(1, Ordering::Relaxed);
            error!("Expander {}: failed to write {:#06x}: {}", self.expander, word, e);
            return Err(e.into());
        }
        state.shadow = word;
        self.metrics.words_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 当前影子字（测试与诊断用）
    pub fn shadow(&self) -> u16 {
        self.state.lock().shadow
    }
}

impl<B: RegisterBus> ActuatorSequencer for DirectSequencer<B> {
    fn add_cycles(&self, port: Port, start: i32, stop: i32) -> Result<(), DriverError> {
        let _move = self.moves.read();
        if self.is_stopping() {
            self.metrics.rejected_requests.fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::Stopping);
        }

        for phase in phase_path(start, stop) {
            self.write_nibble(port, phase)?;
            self.metrics.phases_queued.fetch_add(1, Ordering::Relaxed);
            spin_sleep::sleep(self.period);
        }
        self.write_nibble(port, 0)?;
        self.metrics.all_off_writes.fetch_add(1, Ordering::Relaxed);
        trace!(
            "Expander {} port {}: moved {} -> {}",
            self.expander,
            port.index(),
            start,
            stop
        );
        Ok(())
    }

    fn request_stop(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            debug!("Expander {}: stop requested", self.expander);
        }
    }

    fn wait_for_stop(&self) -> Result<(), DriverError> {
        self.request_stop();
        let _moves = self.moves.write();
        let mut state = self.state.lock();
        if state.shadow != 0 {
            state.chip.write_latch(0)?;
            state.shadow = 0;
            self.metrics.words_written.fetch_add(1, Ordering::Relaxed);
            self.metrics.all_off_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
