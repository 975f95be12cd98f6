//! 船体能力接口
//!
//! 控制器只通过 [`Boat`] 操作船体，通过 [`BoatObserver`] 向外广播状态。
//! 具体的电机/舵机/炮塔实现位于驱动层。

use crate::error::BoatError;
use crate::gun::GunRange;
use crate::targeting::TargetValue;
use smallvec::SmallVec;

/// 船体状态快照
///
/// 依次为：每个电机的（前进, 后退）输出、舵机位置、每个炮塔的位置。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoatReport {
    pub motors: SmallVec<[(f64, f64); 4]>,
    pub rudder: f64,
    pub turrets: SmallVec<[i32; 8]>,
}

impl BoatReport {
    /// 平铺为数值序列（电机对、舵机、炮塔）
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.motors.len() * 2 + 1 + self.turrets.len());
        for &(forward, backward) in &self.motors {
            values.push(forward);
            values.push(backward);
        }
        values.push(self.rudder);
        values.extend(self.turrets.iter().map(|&p| p as f64));
        values
    }
}

/// 船体能力
///
/// 所有方法取 `&self`，实现者自行管理内部可变性；多个连接线程会并发调用。
pub trait Boat: Send + Sync {
    /// 导航：`y` 为油门，`x` 为转向，均在 `[-1, 1]`
    fn navigate(&self, x: f64, y: f64) -> Result<(), BoatError>;

    /// 让指定炮塔转到指定数值
    fn target(&self, gun: usize, value: TargetValue) -> Result<(), BoatError>;

    /// 一次性炮塔归中（接入时调用）
    fn center_guns(&self) -> Result<(), BoatError>;

    /// 当前状态快照
    fn report(&self) -> BoatReport;

    /// 炮塔范围列表（接入后不变）
    fn guns(&self) -> Vec<GunRange>;

    /// 电机数量
    fn motor_count(&self) -> usize;
}

/// 船体状态观察者
pub trait BoatObserver: Send + Sync {
    /// 注册时调用一次
    fn added(&self, boat: &dyn Boat);

    /// 每次成功导航后调用
    fn update(&self, report: &BoatReport);
}
