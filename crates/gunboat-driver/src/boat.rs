//! 三电机船体
//!
//! 左、右、中三台推进电机加一个方向舵，外加任意数量的步进炮塔。
//! 左右电机必须成对出现，至少要有一组推进（左右或中置）。
//!
//! # 推力混合
//!
//! 三台电机都取油门 `y`，转向 `x` 以差值 `delta` 加到左电机、从右电机减去。
//! 差值上限为任一电机恰好满油门时的余量（前进 `1 - y`，后退 `1 + y`），
//! 之后再乘以各电机的平衡系数。

use crate::error::DriverError;
use crate::motor::{Motor, Rudder};
use crate::turret::Turret;
use gunboat_protocol::{Boat, BoatError, BoatReport, GunRange, TargetValue};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// 平衡系数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BoatTuning {
    /// 转向量到推力差的比例
    pub thrust_delta: f64,
    /// 左电机平衡系数
    pub left_delta: f64,
    /// 右电机平衡系数
    pub right_delta: f64,
    /// 中置电机平衡系数
    pub center_delta: f64,
    /// 转向量到舵机行程的比例
    pub to_servo: f64,
}

impl Default for BoatTuning {
    fn default() -> Self {
        Self {
            thrust_delta: 1.0,
            left_delta: 1.0,
            right_delta: 1.0,
            center_delta: 1.0,
            to_servo: 1.0,
        }
    }
}

/// 一次混合的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrustMix {
    pub left: f64,
    pub right: f64,
    pub center: f64,
    pub rudder: f64,
}

impl BoatTuning {
    /// 摇杆 (x, y) → 各电机输出
    pub fn mix(&self, x: f64, y: f64) -> ThrustMix {
        let cap = if y < 0.0 { 1.0 + y } else { 1.0 - y };
        let magnitude = (x.abs() * self.thrust_delta).min(cap);
        let direction = if y < 0.0 { -1.0 } else { 1.0 };
        let delta = direction * if x < 0.0 { -magnitude } else { magnitude };

        ThrustMix {
            left: (y + delta) * self.left_delta,
            right: (y - delta) * self.right_delta,
            center: y * self.center_delta,
            rudder: x * self.to_servo,
        }
    }
}

struct Drive {
    twin: Option<(Motor, Motor)>,
    center: Option<Motor>,
    rudder: Rudder,
}

impl Drive {
    fn apply(&mut self, mix: ThrustMix) -> Result<(), DriverError> {
        if let Some((left, right)) = self.twin.as_mut() {
            left.set_speed(mix.left)?;
            right.set_speed(mix.right)?;
        }
        if let Some(center) = self.center.as_mut() {
            center.set_speed(mix.center)?;
        }
        self.rudder.set_position(mix.rudder)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        if let Some((left, right)) = self.twin.as_mut() {
            left.stop()?;
            right.stop()?;
        }
        if let Some(center) = self.center.as_mut() {
            center.stop()?;
        }
        self.rudder.mid()
    }

    fn motors(&self) -> impl Iterator<Item = &Motor> {
        self.twin
            .iter()
            .flat_map(|(left, right)| [left, right])
            .chain(self.center.iter())
    }
}

/// 三电机船体
pub struct TriMotorBoat {
    drive: Mutex<Drive>,
    /// 每个炮塔单独加锁，直写模式下转动一个炮塔不阻塞其他炮塔
    turrets: Vec<Mutex<Turret>>,
    guns: Vec<GunRange>,
    tuning: BoatTuning,
    centered: AtomicBool,
}

impl TriMotorBoat {
    pub fn builder() -> TriMotorBoatBuilder {
        TriMotorBoatBuilder::new()
    }

    pub fn tuning(&self) -> BoatTuning {
        self.tuning
    }

    /// 电机停转、舵回中（炮塔不动）
    pub fn stop(&self) -> Result<(), BoatError> {
        self.drive
            .lock()
            .stop()
            .map_err(|e| BoatError::Actuator(e.to_string()))
    }

    /// 停船，炮塔回 0 并排空时序器
    pub fn shutdown(&self) -> Result<(), BoatError> {
        let mut first_error = self.stop().err();
        // 先全部归位再停止：同一芯片的时序器一旦停止就不再接受步进
        for (gun, turret) in self.turrets.iter().enumerate() {
            if let Err(e) = turret.lock().home() {
                warn!("Turret {} did not return home: {}", gun, e);
                first_error.get_or_insert(e.into_boat_error(gun));
            }
        }
        for (gun, turret) in self.turrets.iter().enumerate() {
            if let Err(e) = turret.lock().request_stop() {
                first_error.get_or_insert(e.into_boat_error(gun));
            }
        }
        for (gun, turret) in self.turrets.iter().enumerate() {
            if let Err(e) = turret.lock().wait_for_stop() {
                first_error.get_or_insert(e.into_boat_error(gun));
            }
        }
        info!("Boat shut down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 原始角度（圈）映射到步进位置
    fn angle_to_step(range: &GunRange, angle: f64) -> i32 {
        let step = (angle * range.steps as f64).floor() as i64;
        range.min + step.clamp(0, range.steps as i64 - 1) as i32
    }
}

impl Boat for TriMotorBoat {
    fn navigate(&self, x: f64, y: f64) -> Result<(), BoatError> {
        let mix = self.tuning.mix(x, y);
        debug!(
            "navigate ({:.2}, {:.2}) -> L {:.2} R {:.2} C {:.2} rudder {:.2}",
            x, y, mix.left, mix.right, mix.center, mix.rudder
        );
        self.drive
            .lock()
            .apply(mix)
            .map_err(|e| BoatError::Actuator(e.to_string()))
    }

    fn target(&self, gun: usize, value: TargetValue) -> Result<(), BoatError> {
        let Some(turret) = self.turrets.get(gun) else {
            return Err(BoatError::UnknownGun {
                gun,
                count: self.turrets.len(),
            });
        };
        let position = match value {
            TargetValue::Step(step) => step,
            TargetValue::Angle(angle) => Self::angle_to_step(&self.guns[gun], angle),
        };
        debug!("target gun {} -> {}", gun, position);
        turret
            .lock()
            .set(position)
            .map_err(|e| e.into_boat_error(gun))
    }

    fn center_guns(&self) -> Result<(), BoatError> {
        if self.centered.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for (gun, turret) in self.turrets.iter().enumerate() {
            turret.lock().reset().map_err(|e| e.into_boat_error(gun))?;
        }
        info!("{} guns centred", self.turrets.len());
        Ok(())
    }

    fn report(&self) -> BoatReport {
        let drive = self.drive.lock();
        BoatReport {
            motors: drive.motors().map(Motor::outputs).collect(),
            rudder: drive.rudder.position(),
            turrets: self
                .turrets
                .iter()
                .map(|t| t.lock().position())
                .collect::<SmallVec<_>>(),
        }
    }

    fn guns(&self) -> Vec<GunRange> {
        self.guns.clone()
    }

    fn motor_count(&self) -> usize {
        self.drive.lock().motors().count()
    }
}

/// [`TriMotorBoat`] 构造器
///
/// # Example
///
/// ```
/// use gunboat_driver::{Motor, Rudder, TriMotorBoat};
/// use gunboat_protocol::Boat;
///
/// let boat = TriMotorBoat::builder()
///     .twin(Motor::simulated(), Motor::simulated())
///     .center(Motor::simulated())
///     .rudder(Rudder::simulated())
///     .build()
///     .unwrap();
/// assert_eq!(boat.motor_count(), 3);
/// ```
#[derive(Default)]
pub struct TriMotorBoatBuilder {
    twin: Option<(Motor, Motor)>,
    center: Option<Motor>,
    rudder: Option<Rudder>,
    turrets: Vec<Turret>,
    tuning: BoatTuning,
}

impl TriMotorBoatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 左右电机（必须成对）
    pub fn twin(mut self, left: Motor, right: Motor) -> Self {
        self.twin = Some((left, right));
        self
    }

    pub fn center(mut self, motor: Motor) -> Self {
        self.center = Some(motor);
        self
    }

    pub fn rudder(mut self, rudder: Rudder) -> Self {
        self.rudder = Some(rudder);
        self
    }

    /// 追加炮塔，编号按追加顺序
    pub fn turret(mut self, turret: Turret) -> Self {
        self.turrets.push(turret);
        self
    }

    pub fn tuning(mut self, tuning: BoatTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn build(self) -> Result<TriMotorBoat, DriverError> {
        if self.twin.is_none() && self.center.is_none() {
            return Err(DriverError::Configuration(
                "at least one motor (twin or center) must be given".to_string(),
            ));
        }
        let Some(rudder) = self.rudder else {
            return Err(DriverError::Configuration(
                "a rudder servo is required".to_string(),
            ));
        };

        let mut drive = Drive {
            twin: self.twin,
            center: self.center,
            rudder,
        };
        drive.stop()?;

        let guns = self.turrets.iter().map(Turret::range).collect();
        Ok(TriMotorBoat {
            drive: Mutex::new(drive),
            turrets: self.turrets.into_iter().map(Mutex::new).collect(),
            guns,
            tuning: self.tuning,
            centered: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{DirectSequencer, Port};
    use gunboat_bus::MockBus;
    use std::sync::Arc;
    use std::time::Duration;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn boat_with_guns(sizes: &[i32]) -> (TriMotorBoat, MockBus) {
        let bus = MockBus::new();
        let sequencer = Arc::new(DirectSequencer::new(0, bus.clone(), Duration::ZERO).unwrap());
        let mut builder = TriMotorBoat::builder()
            .twin(Motor::simulated(), Motor::simulated())
            .center(Motor::simulated())
            .rudder(Rudder::simulated());
        for (index, &size) in sizes.iter().enumerate() {
            builder = builder.turret(Turret::new(
                size,
                Port::new(index as u8).unwrap(),
                sequencer.clone(),
            ));
        }
        (builder.build().unwrap(), bus)
    }

    #[test]
    fn test_mix_straight_ahead() {
        let mix = BoatTuning::default().mix(0.0, 0.7);
        assert_close(mix.left, 0.7);
        assert_close(mix.right, 0.7);
        assert_close(mix.center, 0.7);
        assert_close(mix.rudder, 0.0);
    }

    #[test]
    fn test_mix_turn_delta_is_capped_at_full_throttle() {
        // 前进 0.8 右转 0.5：余量只有 0.2
        let mix = BoatTuning::default().mix(0.5, 0.8);
        assert_close(mix.left, 1.0);
        assert_close(mix.right, 0.6);
        assert_close(mix.rudder, 0.5);

        // 后退 0.8 左转 0.5：后退方向同样封顶
        let mix = BoatTuning::default().mix(-0.5, -0.8);
        assert_close(mix.left, -0.6);
        assert_close(mix.right, -1.0);
    }

    #[test]
    fn test_mix_spin_in_place() {
        let mix = BoatTuning::default().mix(-1.0, 0.0);
        assert_close(mix.left, -1.0);
        assert_close(mix.right, 1.0);
        assert_close(mix.center, 0.0);
    }

    #[test]
    fn test_mix_applies_balance() {
        let tuning = BoatTuning {
            thrust_delta: 0.5,
            left_delta: 0.9,
            to_servo: -1.0,
            ..BoatTuning::default()
        };
        let mix = tuning.mix(0.4, 0.0);
        assert_close(mix.left, 0.2 * 0.9);
        assert_close(mix.right, -0.2);
        assert_close(mix.rudder, -0.4);
    }

    #[test]
    fn test_build_requires_motor_and_rudder() {
        let result = TriMotorBoat::builder().rudder(Rudder::simulated()).build();
        assert!(matches!(result, Err(DriverError::Configuration(_))));

        let result = TriMotorBoat::builder().center(Motor::simulated()).build();
        assert!(matches!(result, Err(DriverError::Configuration(_))));
    }

    #[test]
    fn test_report_layout() {
        let (boat, _) = boat_with_guns(&[8, -4]);
        boat.navigate(0.0, -0.5).unwrap();
        let report = boat.report();
        assert_eq!(report.motors.len(), 3);
        assert_eq!(report.motors[0], (0.0, 0.5));
        assert_eq!(report.rudder, 0.0);
        assert_eq!(report.turrets.as_slice(), &[0, 0]);
        assert_eq!(boat.motor_count(), 3);
    }

    #[test]
    fn test_target_step_and_angle() {
        let (boat, _) = boat_with_guns(&[8, -4]);
        boat.target(0, TargetValue::Step(5)).unwrap();
        // [-4, 4] 共 9 步，0.5 圈 → 第 4 步 → 0
        boat.target(1, TargetValue::Angle(0.5)).unwrap();
        assert_eq!(boat.report().turrets.as_slice(), &[5, 0]);
        boat.target(1, TargetValue::Angle(0.9999)).unwrap();
        assert_eq!(boat.report().turrets[1], 4);
    }

    #[test]
    fn test_target_errors() {
        let (boat, _) = boat_with_guns(&[8]);
        assert_eq!(
            boat.target(0, TargetValue::Step(9)),
            Err(BoatError::Range {
                gun: 0,
                position: 9,
                min: 0,
                max: 8
            })
        );
        assert_eq!(
            boat.target(3, TargetValue::Step(1)),
            Err(BoatError::UnknownGun { gun: 3, count: 1 })
        );
    }

    #[test]
    fn test_center_guns_runs_once() {
        let (boat, bus) = boat_with_guns(&[2]);
        bus.clear();
        boat.center_guns().unwrap();
        let first = bus.words().len();
        assert!(first > 0);
        boat.center_guns().unwrap();
        assert_eq!(bus.words().len(), first);
    }

    #[test]
    fn test_shutdown_homes_turrets() {
        let (boat, bus) = boat_with_guns(&[8]);
        boat.navigate(0.3, 0.6).unwrap();
        boat.target(0, TargetValue::Step(3)).unwrap();
        boat.shutdown().unwrap();
        let report = boat.report();
        assert_eq!(report.turrets[0], 0);
        assert_eq!(report.motors[0], (0.0, 0.0));
        assert_eq!(bus.words().last(), Some(&0));
    }
}
