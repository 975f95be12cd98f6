//! 装配根：总线、扩展芯片注册表、炮塔与船体

use crate::config::{BusConfig, DaemonConfig};
use anyhow::{Context, Result};
use gunboat_bus::MockBus;
use gunboat_driver::{ExpanderRegistry, Motor, Rudder, SequencerConfig, TriMotorBoat, Turret};
use std::sync::Arc;
use tracing::info;

/// 船体及其持有的扩展芯片
pub struct Fleet {
    pub boat: Arc<TriMotorBoat>,
    registry: ExpanderRegistry,
}

impl Fleet {
    /// 电机与舵机使用模拟 PWM；炮塔挂在配置的总线上
    pub fn build(config: &DaemonConfig) -> Result<Self> {
        let registry = open_registry(config.bus, config.sequencer)?;

        let mut builder = TriMotorBoat::builder()
            .twin(Motor::simulated(), Motor::simulated())
            .center(Motor::simulated())
            .rudder(Rudder::simulated())
            .tuning(config.tuning);
        for (index, turret) in config.turrets.iter().enumerate() {
            let sequencer = registry
                .sequencer(turret.address.expander)
                .with_context(|| {
                    format!(
                        "turret {}: expander {} unavailable",
                        index, turret.address.expander
                    )
                })?;
            builder = builder.turret(Turret::new(turret.size, turret.address.port(), sequencer));
        }
        let boat = builder.build().context("failed to assemble boat")?;
        info!(
            "Boat assembled: {} turrets on {} expanders",
            config.turrets.len(),
            registry.len()
        );

        Ok(Self {
            boat: Arc::new(boat),
            registry,
        })
    }

    /// 停船、炮塔归位，然后停止全部扩展芯片
    pub fn shutdown(&self) -> Result<()> {
        let boat = self.boat.shutdown().context("failed to park the boat");
        let registry = self
            .registry
            .shutdown()
            .context("failed to stop expanders");
        boat.and(registry)
    }
}

fn open_registry(bus: BusConfig, sequencer: SequencerConfig) -> Result<ExpanderRegistry> {
    match bus {
        BusConfig::Mock => {
            info!("Using in-memory expander bus");
            Ok(ExpanderRegistry::with_bus(sequencer, |_address| {
                Ok(MockBus::new())
            }))
        },
        #[cfg(target_os = "linux")]
        BusConfig::I2c { bus } => {
            info!("Using /dev/i2c-{}", bus);
            Ok(ExpanderRegistry::with_bus(sequencer, move |address| {
                gunboat_bus::I2cDevBus::open(bus, address)
            }))
        },
        #[cfg(not(target_os = "linux"))]
        BusConfig::I2c { bus } => {
            anyhow::bail!("I2C bus {} requires Linux i2c-dev", bus)
        },
    }
}
