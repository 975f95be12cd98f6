//! 日志观察者

use gunboat_protocol::{Boat, BoatObserver, BoatReport};
use tracing::{debug, info};

/// 把船体状态写入 `tracing` 日志
#[derive(Debug, Default)]
pub struct TracingObserver;

impl BoatObserver for TracingObserver {
    fn added(&self, boat: &dyn Boat) {
        let guns = boat.guns();
        info!(
            "Observing boat: {} motors, {} guns {:?}",
            boat.motor_count(),
            guns.len(),
            guns.iter().map(|g| (g.min, g.max)).collect::<Vec<_>>()
        );
    }

    fn update(&self, report: &BoatReport) {
        debug!(
            "motors {:?} rudder {:.2} turrets {:?}",
            report.motors.as_slice(),
            report.rudder,
            report.turrets.as_slice()
        );
    }
}
