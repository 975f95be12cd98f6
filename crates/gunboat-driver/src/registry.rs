//! 扩展芯片注册表
//!
//! 每个芯片地址只创建一个时序器，由装配根持有注册表，
//! 炮塔构造时通过 `Arc` 取得共享引用。关机时统一排空并停止。

use crate::error::DriverError;
use crate::sequencer::{
    ActuatorSequencer, BufferedSequencer, DirectSequencer, SequencerConfig, SequencerMode,
};
use gunboat_bus::{BusError, RegisterBus, mcp23017};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

type SequencerFactory =
    Box<dyn Fn(u8) -> Result<Arc<dyn ActuatorSequencer>, DriverError> + Send + Sync>;

/// 扩展芯片注册表
pub struct ExpanderRegistry {
    sequencers: Mutex<BTreeMap<u8, Arc<dyn ActuatorSequencer>>>,
    factory: SequencerFactory,
}

impl ExpanderRegistry {
    /// 使用自定义工厂（参数为芯片索引）
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(u8) -> Result<Arc<dyn ActuatorSequencer>, DriverError> + Send + Sync + 'static,
    {
        Self {
            sequencers: Mutex::new(BTreeMap::new()),
            factory: Box::new(factory),
        }
    }

    /// 由总线打开函数构造（参数为芯片总线地址）
    ///
    /// # Example
    ///
    /// ```
    /// use gunboat_bus::MockBus;
    /// use gunboat_driver::{ActuatorSequencer, ExpanderRegistry, SequencerConfig};
    ///
    /// let registry = ExpanderRegistry::with_bus(SequencerConfig::default(), |_address| {
    ///     Ok(MockBus::new())
    /// });
    /// let sequencer = registry.sequencer(0).unwrap();
    /// assert!(!sequencer.is_stopping());
    /// registry.shutdown().unwrap();
    /// ```
    pub fn with_bus<B, F>(config: SequencerConfig, open_bus: F) -> Self
    where
        B: RegisterBus + 'static,
        F: Fn(u16) -> Result<B, BusError> + Send + Sync + 'static,
    {
        Self::new(move |expander| {
            let bus = open_bus(mcp23017::address(expander))?;
            let sequencer: Arc<dyn ActuatorSequencer> = match config.mode {
                SequencerMode::Buffered => {
                    Arc::new(BufferedSequencer::start(expander, bus, config.period())?)
                },
                SequencerMode::Direct => {
                    Arc::new(DirectSequencer::new(expander, bus, config.period())?)
                },
            };
            Ok(sequencer)
        })
    }

    /// 取得（必要时创建）指定芯片的时序器
    pub fn sequencer(&self, expander: u8) -> Result<Arc<dyn ActuatorSequencer>, DriverError> {
        let mut sequencers = self.sequencers.lock();
        if let Some(existing) = sequencers.get(&expander) {
            return Ok(existing.clone());
        }
        let created = (self.factory)(expander)?;
        info!("Expander {} registered", expander);
        sequencers.insert(expander, created.clone());
        Ok(created)
    }

    pub fn len(&self) -> usize {
        self.sequencers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequencers.lock().is_empty()
    }

    /// 先对全部时序器请求停止，再逐个等待
    ///
    /// 返回遇到的第一个错误，但不会因此跳过其余时序器。
    pub fn shutdown(&self) -> Result<(), DriverError> {
        let sequencers: Vec<_> = self.sequencers.lock().values().cloned().collect();
        for sequencer in &sequencers {
            sequencer.request_stop();
        }

        let mut first_error = None;
        for sequencer in &sequencers {
            if let Err(e) = sequencer.wait_for_stop() {
                warn!("Sequencer failed to stop cleanly: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
