//! 电机与舵机
//!
//! PWM 输出被抽象为接受归一化数值的执行器；引脚编号与 PWM 频率由具体
//! 实现负责。仓库内只提供 [`SimulatedPwm`]，用于无硬件运行与测试。

use crate::error::DriverError;

/// 归一化 PWM 输出
pub trait PwmOutput: Send {
    /// 设置输出值（电机引脚 `[0, 1]`，舵机 `[-1, 1]`）
    fn set_value(&mut self, value: f64) -> Result<(), DriverError>;

    /// 最近一次设置的值
    fn value(&self) -> f64;
}

/// 只记录数值的 PWM 输出
#[derive(Debug, Clone, Default)]
pub struct SimulatedPwm {
    value: f64,
}

impl SimulatedPwm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PwmOutput for SimulatedPwm {
    fn set_value(&mut self, value: f64) -> Result<(), DriverError> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// 双向直流电机（前进/后退两路 PWM）
pub struct Motor {
    forward: Box<dyn PwmOutput>,
    backward: Box<dyn PwmOutput>,
}

impl Motor {
    pub fn new(forward: Box<dyn PwmOutput>, backward: Box<dyn PwmOutput>) -> Self {
        Self { forward, backward }
    }

    /// 两路均为 [`SimulatedPwm`] 的电机
    pub fn simulated() -> Self {
        Self::new(Box::new(SimulatedPwm::new()), Box::new(SimulatedPwm::new()))
    }

    /// 设置速度：正值前进、负值后退，截断到 `[-1, 1]`
    ///
    /// 先关闭反向引脚再打开正向引脚，避免两路同时导通。
    pub fn set_speed(&mut self, speed: f64) -> Result<(), DriverError> {
        let speed = speed.clamp(-1.0, 1.0);
        if speed >= 0.0 {
            self.backward.set_value(0.0)?;
            self.forward.set_value(speed)
        } else {
            self.forward.set_value(0.0)?;
            self.backward.set_value(-speed)
        }
    }

    pub fn stop(&mut self) -> Result<(), DriverError> {
        self.set_speed(0.0)
    }

    /// 当前速度（前进减后退）
    pub fn speed(&self) -> f64 {
        self.forward.value() - self.backward.value()
    }

    /// 引脚状态（前进, 后退）
    pub fn outputs(&self) -> (f64, f64) {
        (self.forward.value(), self.backward.value())
    }
}

/// 舵机（方向舵）
pub struct Rudder {
    servo: Box<dyn PwmOutput>,
}

impl Rudder {
    pub fn new(servo: Box<dyn PwmOutput>) -> Self {
        Self { servo }
    }

    pub fn simulated() -> Self {
        Self::new(Box::new(SimulatedPwm::new()))
    }

    /// 设置舵角，截断到 `[-1, 1]`
    pub fn set_position(&mut self, position: f64) -> Result<(), DriverError> {
        self.servo.set_value(position.clamp(-1.0, 1.0))
    }

    /// 回中
    pub fn mid(&mut self) -> Result<(), DriverError> {
        self.servo.set_value(0.0)
    }

    pub fn position(&self) -> f64 {
        self.servo.value()
    }
}
