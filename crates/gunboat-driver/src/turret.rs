//! 步进炮塔
//!
//! 炮塔只知道自己的范围、当前位置和所在端口，步进由共享的
//! [`ActuatorSequencer`] 完成。位置是开环的逻辑位置，`reset()` 借助
//! 最小位置外侧的机械限位重新同步。

use crate::error::DriverError;
use crate::sequencer::{ActuatorSequencer, Port};
use gunboat_protocol::GunRange;
use std::sync::Arc;
use tracing::{debug, warn};

/// 炮塔地址：芯片索引 + 端口 A/B + 高低半字节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurretAddress {
    pub expander: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bank_b: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub high_nibble: bool,
}

impl TurretAddress {
    pub fn port(&self) -> Port {
        Port::from_bank(self.bank_b, self.high_nibble)
    }
}

/// 步进炮塔
pub struct Turret {
    range: GunRange,
    port: Port,
    position: i32,
    sequencer: Arc<dyn ActuatorSequencer>,
}

impl Turret {
    /// 由带符号尺寸构造，见 [`GunRange::from_size`]
    pub fn new(size: i32, port: Port, sequencer: Arc<dyn ActuatorSequencer>) -> Self {
        Self {
            range: GunRange::from_size(size),
            port,
            position: 0,
            sequencer,
        }
    }

    pub fn range(&self) -> GunRange {
        self.range
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    /// 转到指定位置
    ///
    /// 越界时返回 [`DriverError::OutOfRange`]，位置不变。
    pub fn set(&mut self, position: i32) -> Result<(), DriverError> {
        if !self.range.contains(position) {
            return Err(DriverError::OutOfRange {
                position,
                min: self.range.min,
                max: self.range.max,
            });
        }
        self.sequencer
            .add_cycles(self.port, self.position, position)?;
        self.position = position;
        Ok(())
    }

    /// 归中：先到最大，再到最小（撞限位同步），最后回到 0
    pub fn reset(&mut self) -> Result<(), DriverError> {
        let GunRange { min, max, .. } = self.range;
        self.sequencer.add_cycles(self.port, self.position, max)?;
        self.position = max;
        self.sequencer.add_cycles(self.port, max, min)?;
        self.position = min;
        self.sequencer.add_cycles(self.port, min, 0)?;
        self.position = 0;
        debug!("Turret on port {} reset", self.port.index());
        Ok(())
    }

    /// 回到 0（已在 0 时不动）
    pub fn home(&mut self) -> Result<(), DriverError> {
        if self.position == 0 {
            return Ok(());
        }
        self.set(0)
    }

    /// 回到 0 后请求时序器停止
    ///
    /// 时序器由同一芯片上的炮塔共享，应先让所有炮塔 `home()` 再逐个停止。
    pub fn request_stop(&mut self) -> Result<(), DriverError> {
        let result = self.home();
        if let Err(e) = &result {
            warn!(
                "Turret on port {} could not return to 0: {}",
                self.port.index(),
                e
            );
        }
        self.sequencer.request_stop();
        result
    }

    pub fn wait_for_stop(&self) -> Result<(), DriverError> {
        self.sequencer.wait_for_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 只记录移动区段的时序器
    #[derive(Default)]
    struct RecordingSequencer {
        legs: Mutex<Vec<(usize, i32, i32)>>,
        stopping: AtomicBool,
    }

    impl ActuatorSequencer for RecordingSequencer {
        fn add_cycles(&self, port: Port, start: i32, stop: i32) -> Result<(), DriverError> {
            if self.is_stopping() {
                return Err(DriverError::Stopping);
            }
            self.legs.lock().push((port.index(), start, stop));
            Ok(())
        }

        fn request_stop(&self) {
            self.stopping.store(true, Ordering::SeqCst);
        }

        fn wait_for_stop(&self) -> Result<(), DriverError> {
            Ok(())
        }

        fn is_stopping(&self) -> bool {
            self.stopping.load(Ordering::SeqCst)
        }

        fn metrics(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    fn turret(size: i32) -> (Turret, Arc<RecordingSequencer>) {
        let sequencer = Arc::new(RecordingSequencer::default());
        let turret = Turret::new(size, Port::new(2).unwrap(), sequencer.clone());
        (turret, sequencer)
    }

    #[test]
    fn test_set_in_range_moves() {
        let (mut turret, sequencer) = turret(8);
        turret.set(5).unwrap();
        turret.set(2).unwrap();
        assert_eq!(turret.position(), 2);
        assert_eq!(*sequencer.legs.lock(), vec![(2, 0, 5), (2, 5, 2)]);
    }

    #[test]
    fn test_set_out_of_range_keeps_position() {
        let (mut turret, sequencer) = turret(8);
        turret.set(3).unwrap();
        let err = turret.set(9).unwrap_err();
        assert!(matches!(
            err,
            DriverError::OutOfRange {
                position: 9,
                min: 0,
                max: 8
            }
        ));
        assert!(turret.set(-1).is_err());
        assert_eq!(turret.position(), 3);
        assert_eq!(sequencer.legs.lock().len(), 1);
    }

    #[test]
    fn test_negative_size_accepts_negative_positions() {
        let (mut turret, _) = turret(-6);
        assert_eq!(turret.range().min, -6);
        turret.set(-6).unwrap();
        turret.set(6).unwrap();
        assert!(turret.set(7).is_err());
    }

    #[test]
    fn test_reset_visits_max_min_zero() {
        let (mut turret, sequencer) = turret(-4);
        turret.set(1).unwrap();
        sequencer.legs.lock().clear();

        turret.reset().unwrap();
        assert_eq!(turret.position(), 0);
        assert_eq!(
            *sequencer.legs.lock(),
            vec![(2, 1, 4), (2, 4, -4), (2, -4, 0)]
        );
    }

    #[test]
    fn test_request_stop_returns_home_first() {
        let (mut turret, sequencer) = turret(8);
        turret.set(6).unwrap();
        turret.request_stop().unwrap();
        assert_eq!(turret.position(), 0);
        assert!(sequencer.is_stopping());
        assert_eq!(sequencer.legs.lock().last(), Some(&(2, 6, 0)));
        assert!(matches!(turret.set(1), Err(DriverError::Stopping)));
    }

    #[test]
    fn test_home_when_already_home_is_noop() {
        let (mut turret, sequencer) = turret(8);
        turret.home().unwrap();
        assert!(sequencer.legs.lock().is_empty());
        turret.request_stop().unwrap();
        assert!(sequencer.legs.lock().is_empty());
    }

    #[test]
    fn test_address_to_port() {
        let address = TurretAddress {
            expander: 0,
            bank_b: true,
            high_nibble: true,
        };
        assert_eq!(address.port().index(), 3);
    }
}
