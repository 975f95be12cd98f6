//! 瞄准引擎
//!
//! 纯函数模块：把一次瞄准手势（极坐标）映射为"哪个炮塔、转到哪里"。
//!
//! # 规则概览
//!
//! - 半径不超过 `dead_zone_radius` 视为无瞄准输入（所有布局）
//! - 1 个瞄准连接：一个控制面驱动全部炮塔，按布局分扇区或分环
//! - 2 个瞄准连接：分控尚未定义，只计算参与的炮塔编号
//! - 3 个及以上：一对一，第 k 个瞄准连接驱动第 k 个炮塔
//!
//! # 扇区边界
//!
//! 扇区区间左闭右开，边界角度归属于更高的扇区。扇区内的局部角度先归一化到
//! `[0, 1]`（左舷扇区镜像，使两舷都从船头向外扫），再截断到中间
//! `1 - 2 * sector_margin` 的有效带（两端各 `sector_margin` 为死带，
//! 落在死带中的输入饱和到有效带边缘），最后线性缩放到炮塔步进范围。

use crate::error::ConfigurationError;
use crate::gun::GunRange;
use crate::polar::{PolarPoint, to_polar_with_centre};
use crate::topology::TurretTopology;

/// 瞄准常量
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TargetingConfig {
    /// 中心死区：半径不超过此值时角度恒为 0
    pub centre_radius: f64,
    /// 瞄准死区：半径不超过此值时忽略输入
    pub dead_zone_radius: f64,
    /// 扇区两端的死带宽度（占扇区宽度的比例）
    pub sector_margin: f64,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            centre_radius: 0.1,
            dead_zone_radius: 0.3,
            sector_margin: 0.05,
        }
    }
}

impl TargetingConfig {
    /// 有效带宽度（默认 0.9）
    pub fn active_band(&self) -> f64 {
        1.0 - 2.0 * self.sector_margin
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..1.0).contains(&self.centre_radius) {
            return Err(ConfigurationError::InvalidConstant {
                name: "centre_radius",
                value: self.centre_radius,
            });
        }
        if !(self.centre_radius..1.0).contains(&self.dead_zone_radius) {
            return Err(ConfigurationError::InvalidConstant {
                name: "dead_zone_radius",
                value: self.dead_zone_radius,
            });
        }
        if !(0.0..0.5).contains(&self.sector_margin) {
            return Err(ConfigurationError::InvalidConstant {
                name: "sector_margin",
                value: self.sector_margin,
            });
        }
        Ok(())
    }
}

/// 发往炮塔的数值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetValue {
    /// 已缩放到炮塔步进范围内的位置
    Step(i32),
    /// 未缩放的原始角度（圈，`[0, 1)`），由船体映射到步进范围
    Angle(f64),
}

/// 一次瞄准的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSelection {
    /// 指定炮塔转到指定数值
    Aim { gun: usize, value: TargetValue },
    /// 无瞄准输入（死区或最内环）
    Idle,
    /// 两连接分控：只确定了参与的炮塔，不下发命令
    Unsupported { gun: usize },
    /// 一对一映射下连接编号超出炮塔数
    Unassigned { gun: usize },
}

/// 扇区描述
#[derive(Debug, Clone, Copy)]
struct Sector {
    gun: usize,
    start: f64,
    width: f64,
    mirrored: bool,
}

/// 方形布局：右舷 3、右后 1、左后 0、左舷 2
const SQUARE_SECTORS: [Sector; 4] = [
    Sector { gun: 3, start: 0.0, width: 0.25, mirrored: false },
    Sector { gun: 1, start: 0.25, width: 0.25, mirrored: false },
    Sector { gun: 0, start: 0.5, width: 0.25, mirrored: true },
    Sector { gun: 2, start: 0.75, width: 0.25, mirrored: true },
];

/// 三角布局：右舷 2、尾部 0（半圈宽）、左舷 1
const TRIANGLE_SECTORS: [Sector; 3] = [
    Sector { gun: 2, start: 0.0, width: 0.25, mirrored: false },
    Sector { gun: 0, start: 0.25, width: 0.5, mirrored: false },
    Sector { gun: 1, start: 0.75, width: 0.25, mirrored: true },
];

/// 瞄准引擎
///
/// 接入船体时构造一次，之后只读，可在任意线程无锁使用。
#[derive(Debug, Clone)]
pub struct TargetingEngine {
    guns: Vec<GunRange>,
    topology: TurretTopology,
    config: TargetingConfig,
}

impl TargetingEngine {
    /// 由炮塔列表构造，推导布局
    pub fn new(guns: Vec<GunRange>, config: TargetingConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let topology = TurretTopology::from_guns(&guns)?;
        Ok(Self {
            guns,
            topology,
            config,
        })
    }

    pub fn topology(&self) -> TurretTopology {
        self.topology
    }

    pub fn guns(&self) -> &[GunRange] {
        &self.guns
    }

    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    /// 坐标转极坐标（使用本引擎的中心死区）
    pub fn polar(&self, x: f64, y: f64) -> PolarPoint {
        to_polar_with_centre(x, y, self.config.centre_radius)
    }

    /// 由笛卡尔坐标选择炮塔
    ///
    /// - `active_targets`: 当前活跃的瞄准连接数
    /// - `rank`: 编号低于本连接的活跃瞄准连接数
    pub fn select_xy(&self, x: f64, y: f64, active_targets: usize, rank: usize) -> TargetSelection {
        self.select(self.polar(x, y), active_targets, rank)
    }

    /// 由极坐标选择炮塔
    pub fn select(&self, point: PolarPoint, active_targets: usize, rank: usize) -> TargetSelection {
        if point.radius <= self.config.dead_zone_radius {
            return TargetSelection::Idle;
        }

        match active_targets {
            0 => TargetSelection::Idle,
            1 => self.select_single(point),
            2 => TargetSelection::Unsupported { gun: rank },
            _ => {
                if rank < self.guns.len() {
                    TargetSelection::Aim {
                        gun: rank,
                        value: TargetValue::Angle(point.angle),
                    }
                } else {
                    TargetSelection::Unassigned { gun: rank }
                }
            },
        }
    }

    fn select_single(&self, point: PolarPoint) -> TargetSelection {
        match self.topology {
            TurretTopology::Square => self.select_sector(&SQUARE_SECTORS, point.angle),
            TurretTopology::Triangle => self.select_sector(&TRIANGLE_SECTORS, point.angle),
            TurretTopology::Concentric { rings } => {
                let ring = (point.radius * rings as f64).ceil() as usize;
                if ring > 1 {
                    TargetSelection::Aim {
                        gun: ring - 2,
                        value: TargetValue::Angle(point.angle),
                    }
                } else {
                    TargetSelection::Idle
                }
            },
            // 单连接下不会出现，按一对一处理第 0 号炮塔
            TurretTopology::Linear => TargetSelection::Aim {
                gun: 0,
                value: TargetValue::Angle(point.angle),
            },
        }
    }

    fn select_sector(&self, sectors: &[Sector], angle: f64) -> TargetSelection {
        // 区间左闭右开：从高扇区往回找第一个 start <= angle 的扇区
        let Some(sector) = sectors.iter().rev().find(|s| angle >= s.start) else {
            return TargetSelection::Idle;
        };
        let Some(range) = self.guns.get(sector.gun) else {
            return TargetSelection::Idle;
        };

        let local = if sector.mirrored {
            (sector.start + sector.width - angle) / sector.width
        } else {
            (angle - sector.start) / sector.width
        };

        TargetSelection::Aim {
            gun: sector.gun,
            value: TargetValue::Step(self.scale(local, range)),
        }
    }

    /// 局部角度 → 步进位置（截断到有效带后线性缩放）
    fn scale(&self, local: f64, range: &GunRange) -> i32 {
        let margin = self.config.sector_margin;
        let clamped = local.clamp(margin, 1.0 - margin);
        let fraction = (clamped - margin) / self.config.active_band();
        let step = (fraction * range.steps as f64).floor() as i64;
        let step = step.clamp(0, range.steps as i64 - 1);
        range.min + step as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(sizes: &[i32]) -> TargetingEngine {
        let guns = sizes.iter().map(|&s| GunRange::from_size(s)).collect();
        TargetingEngine::new(guns, TargetingConfig::default()).unwrap()
    }

    fn point(radius: f64, angle: f64) -> PolarPoint {
        PolarPoint { radius, angle }
    }

    fn aimed_gun(selection: TargetSelection) -> usize {
        match selection {
            TargetSelection::Aim { gun, .. } => gun,
            other => panic!("expected aim, got {:?}", other),
        }
    }

    fn aimed_step(selection: TargetSelection) -> i32 {
        match selection {
            TargetSelection::Aim {
                value: TargetValue::Step(step),
                ..
            } => step,
            other => panic!("expected step aim, got {:?}", other),
        }
    }

    #[test]
    fn test_dead_zone_ignored_for_every_topology() {
        for sizes in [&[8, 8, 8, 8][..], &[-6, 8, 8][..], &[8][..]] {
            let engine = engine(sizes);
            assert_eq!(engine.select(point(0.3, 0.4), 1, 0), TargetSelection::Idle);
            assert_eq!(engine.select(point(0.0, 0.0), 1, 0), TargetSelection::Idle);
        }
    }

    #[test]
    fn test_square_sector_assignment() {
        let engine = engine(&[8, 8, 8, 8]);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.1), 1, 0)), 3);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.3), 1, 0)), 1);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.6), 1, 0)), 0);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.9), 1, 0)), 2);
    }

    #[test]
    fn test_square_boundary_belongs_to_higher_sector() {
        let engine = engine(&[8, 8, 8, 8]);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.25), 1, 0)), 1);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.5), 1, 0)), 0);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.75), 1, 0)), 2);
    }

    #[test]
    fn test_square_edges_saturate_inside_range() {
        let engine = engine(&[8, 8, 8, 8]);
        // 扇区起点落在死带，饱和到最小值
        assert_eq!(aimed_step(engine.select(point(0.9, 0.0), 1, 0)), 0);
        assert_eq!(aimed_step(engine.select(point(0.9, 0.01), 1, 0)), 0);
        // 扇区末端饱和到最大值而不越界
        assert_eq!(aimed_step(engine.select(point(0.9, 0.2499), 1, 0)), 8);
        // 中点
        assert_eq!(aimed_step(engine.select(point(0.9, 0.125), 1, 0)), 4);
    }

    #[test]
    fn test_square_port_side_is_mirrored() {
        let engine = engine(&[8, 8, 8, 8]);
        // 左舷扇区末端（靠近船头）对应炮塔起点
        assert_eq!(aimed_step(engine.select(point(0.9, 0.999), 1, 0)), 0);
        assert_eq!(aimed_step(engine.select(point(0.9, 0.76), 1, 0)), 8);
    }

    #[test]
    fn test_square_values_stay_in_range_for_centre_mounted_guns() {
        let engine = engine(&[-4, -4, -4, -4]);
        for i in 0..1000 {
            let angle = i as f64 / 1000.0;
            let step = aimed_step(engine.select(point(1.0, angle), 1, 0));
            assert!((-4..=4).contains(&step), "angle {} -> {}", angle, step);
        }
    }

    #[test]
    fn test_triangle_sectors() {
        let engine = engine(&[-6, 8, 8]);
        assert_eq!(engine.topology(), TurretTopology::Triangle);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.1), 1, 0)), 2);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.25), 1, 0)), 0);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.5), 1, 0)), 0);
        assert_eq!(aimed_gun(engine.select(point(0.8, 0.75), 1, 0)), 1);
        // 尾部炮塔半圈宽，中点对应中位
        assert_eq!(aimed_step(engine.select(point(0.8, 0.5), 1, 0)), 0);
    }

    #[test]
    fn test_concentric_rings() {
        // 2 门炮 → 3 环，每环 1/3
        let engine = engine(&[8, 8]);
        assert_eq!(engine.select(point(0.32, 0.4), 1, 0), TargetSelection::Idle);
        assert_eq!(
            engine.select(point(0.5, 0.4), 1, 0),
            TargetSelection::Aim {
                gun: 0,
                value: TargetValue::Angle(0.4)
            }
        );
        assert_eq!(
            engine.select(point(1.0, 0.4), 1, 0),
            TargetSelection::Aim {
                gun: 1,
                value: TargetValue::Angle(0.4)
            }
        );
    }

    #[test]
    fn test_two_targets_only_reports_gun() {
        let engine = engine(&[8, 8, 8, 8]);
        assert_eq!(
            engine.select(point(0.9, 0.1), 2, 1),
            TargetSelection::Unsupported { gun: 1 }
        );
    }

    #[test]
    fn test_one_to_one_mapping() {
        let engine = engine(&[8, 8, 8, 8]);
        assert_eq!(
            engine.select(point(0.9, 0.6), 3, 2),
            TargetSelection::Aim {
                gun: 2,
                value: TargetValue::Angle(0.6)
            }
        );
        assert_eq!(
            engine.select(point(0.9, 0.6), 5, 4),
            TargetSelection::Unassigned { gun: 4 }
        );
        assert_eq!(engine.select(point(0.2, 0.6), 3, 0), TargetSelection::Idle);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let guns = vec![GunRange::from_size(8)];
        let config = TargetingConfig {
            sector_margin: 0.5,
            ..TargetingConfig::default()
        };
        assert!(matches!(
            TargetingEngine::new(guns, config),
            Err(ConfigurationError::InvalidConstant {
                name: "sector_margin",
                ..
            })
        ));
    }
}
