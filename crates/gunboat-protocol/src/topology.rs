//! 炮塔布局推导
//!
//! 布局在船体接入时由炮塔列表一次性推导，接入期间不再变化。

use crate::error::ConfigurationError;
use crate::gun::GunRange;

/// 炮塔布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurretTopology {
    /// 四个及以上炮塔，按四分之一圈划分扇区
    Square,
    /// 恰好三个炮塔，且 1、2 号炮塔跨度相同
    Triangle,
    /// 同心环：环数为炮塔数 + 1（最内环无炮塔）
    Concentric { rings: usize },
    /// 一对一映射：每个瞄准连接驱动一个炮塔
    Linear,
}

impl TurretTopology {
    /// 由炮塔列表推导布局
    ///
    /// `Linear` 不由炮塔列表决定，见 [`TurretTopology::for_targets`]。
    pub fn from_guns(guns: &[GunRange]) -> Result<Self, ConfigurationError> {
        if guns.is_empty() {
            return Err(ConfigurationError::NoGuns);
        }
        for (index, gun) in guns.iter().enumerate() {
            if !gun.is_valid() {
                return Err(ConfigurationError::InvalidGunRange {
                    index,
                    min: gun.min,
                    max: gun.max,
                });
            }
        }

        let topology = match guns.len() {
            n if n > 3 => TurretTopology::Square,
            3 if guns[1].span() == guns[2].span() => TurretTopology::Triangle,
            n => TurretTopology::Concentric { rings: n + 1 },
        };
        Ok(topology)
    }

    /// 当前活跃瞄准连接数下实际生效的布局
    ///
    /// 三个及以上瞄准连接时退化为一对一映射。
    pub fn for_targets(self, active_targets: usize) -> Self {
        if active_targets >= 3 {
            TurretTopology::Linear
        } else {
            self
        }
    }
}
