//! 缓冲时序器
//!
//! 每个端口一个无界队列，一次 `add_cycles` 作为一批相位整体入队，
//! 后台排空线程按固定周期把各端口的下一个相位拼成一个字写出。
//! 某端口队列为空时其半字节写 0；所有端口都空闲且上一次写出的字非零时，
//! 额外写一次全关，保证不会有线圈保持通电。
//!
//! 入队与停止请求由 `gate` 串行化：停止标志置位后不会再有批次入队，
//! 排空线程在每轮开始时读取标志，看到停止时此前入队的批次必然可见。

use super::{ActuatorSequencer, Port};
use crate::error::DriverError;
use crate::metrics::{MetricsSnapshot, SequencerMetrics};
use crate::phase::phase_path;
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use gunboat_bus::mcp23017::PORTS;
use gunboat_bus::{Mcp23017, RegisterBus};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// 缓冲时序器
pub struct BufferedSequencer {
    expander: u8,
    senders: Vec<Sender<Vec<u8>>>,
    /// 入队持读锁，停止请求持写锁
    gate: RwLock<()>,
    stopping: Arc<AtomicBool>,
    metrics: Arc<SequencerMetrics>,
    /// 排空线程句柄（wait_for_stop 时 join）
    drain_thread: Mutex<Option<JoinHandle<()>>>,
}

impl BufferedSequencer {
    /// 初始化芯片并启动排空线程
    pub fn start<B>(expander: u8, bus: B, period: Duration) -> Result<Self, DriverError>
    where
        B: RegisterBus + 'static,
    {
        let mut chip = Mcp23017::new(bus);
        chip.initialise()?;

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..PORTS).map(|_| unbounded()).unzip();
        let stopping = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(SequencerMetrics::default());

        let thread_stopping = stopping.clone();
        let thread_metrics = metrics.clone();
        let drain_thread = std::thread::Builder::new()
            .name(format!("expander-{}", expander))
            .spawn(move || {
                drain_loop(chip, receivers, thread_stopping, thread_metrics, period);
            })
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        debug!(
            "Expander {} buffered sequencer started (period {:?})",
            expander, period
        );
        Ok(Self {
            expander,
            senders,
            gate: RwLock::new(()),
            stopping,
            metrics,
            drain_thread: Mutex::new(Some(drain_thread)),
        })
    }

    pub fn expander(&self) -> u8 {
        self.expander
    }
}

impl ActuatorSequencer for BufferedSequencer {
    fn add_cycles(&self, port: Port, start: i32, stop: i32) -> Result<(), DriverError> {
        let _gate = self.gate.read();
        if self.is_stopping() {
            self.metrics.rejected_requests.fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::Stopping);
        }

        let batch: Vec<u8> = phase_path(start, stop).collect();
        let queued = batch.len();
        self.senders[port.index()]
            .send(batch)
            .map_err(|_| DriverError::ChannelClosed)?;
        self.metrics
            .phases_queued
            .fetch_add(queued as u64, Ordering::Relaxed);
        trace!(
            "Expander {} port {}: queued {} phases ({} -> {})",
            self.expander,
            port.index(),
            queued,
            start,
            stop
        );
        Ok(())
    }

    fn request_stop(&self) {
        let _gate = self.gate.write();
        if !self.stopping.swap(true, Ordering::AcqRel) {
            debug!("Expander {}: stop requested", self.expander);
        }
    }

    fn wait_for_stop(&self) -> Result<(), DriverError> {
        self.request_stop();
        let handle = self.drain_thread.lock().take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| DriverError::IoThread("drain thread panicked".to_string()))?;
            debug!("Expander {}: drain thread stopped", self.expander);
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

impl Drop for BufferedSequencer {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_stop() {
            warn!("Expander {}: {}", self.expander, e);
        }
    }
}

/// 排空循环
///
/// 退出条件：已请求停止、所有队列为空、最后写出的字为 0。
fn drain_loop<B: RegisterBus>(
    mut chip: Mcp23017<B>,
    receivers: Vec<Receiver<Vec<u8>>>,
    stopping: Arc<AtomicBool>,
    metrics: Arc<SequencerMetrics>,
    period: Duration,
) {
    let mut last: u16 = 0;
    // 每个端口当前正在走的批次
    let mut active: Vec<VecDeque<u8>> = vec![VecDeque::new(); receivers.len()];

    loop {
        // 先读标志再取队列
        let stop_seen = stopping.load(Ordering::Acquire);
        let mut word: u16 = 0;
        let mut pending = false;
        for (index, receiver) in receivers.iter().enumerate() {
            if active[index].is_empty() {
                match receiver.try_recv() {
                    Ok(batch) => active[index].extend(batch),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {},
                }
            }
            if let Some(phase) = active[index].pop_front() {
                word |= ((phase & 0x0F) as u16) << (index * 4);
                pending = true;
            }
        }

        if pending {
            match chip.write_latch(word) {
                Ok(()) => {
                    metrics.words_written.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => {
                    metrics.bus_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Failed to write phase word {:#06x}: {}", word, e);
                },
            }
            // 写失败时线圈状态未知，仍按非零处理以便随后补写全关
            last = word;
        } else if last != 0 {
            match chip.write_latch(0) {
                Ok(()) => {
                    metrics.words_written.fetch_add(1, Ordering::Relaxed);
                    metrics.all_off_writes.fetch_add(1, Ordering::Relaxed);
                    last = 0;
                },
                Err(e) => {
                    metrics.bus_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Failed to switch coils off: {}", e);
                    if stop_seen {
                        break;
                    }
                },
            }
        } else if stop_seen {
            break;
        }

        spin_sleep::sleep(period);
    }

    trace!("Drain thread: loop exited");
}
