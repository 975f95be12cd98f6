//! 笛卡尔坐标到极坐标的映射
//!
//! 半径被截断到 1；角度以圈为单位（`[0, 1)`），从 `+y` 顺时针计量：
//!
//! | 方向 | 角度 |
//! |------|------|
//! | `+y` | 0.0 |
//! | `+x` | 0.25 |
//! | `-y` | 0.5 |
//! | `-x` | 0.75 |
//!
//! 计算使用按象限选择的反正切：`|y| >= |x|` 时取 `atan(x/y)`，否则取
//! `atan(y/x)` 并经 ±½π 折回，再加上由符号组合得到的半圈偏移。
//! 除 `+y` 处 1 → 0 的回绕外映射处处连续。

use std::f64::consts::PI;

/// 中心死区半径：半径不超过此值时角度恒为 0
pub const CENTRE_RADIUS: f64 = 0.1;

/// 极坐标点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPoint {
    /// 半径，`[0, 1]`
    pub radius: f64,
    /// 角度（圈），`[0, 1)`
    pub angle: f64,
}

/// 使用默认中心死区进行转换
///
/// # 示例
///
/// ```
/// use gunboat_protocol::to_polar;
///
/// let p = to_polar(1.0, 0.0);
/// assert_eq!(p.radius, 1.0);
/// assert!((p.angle - 0.25).abs() < 1e-12);
/// ```
pub fn to_polar(x: f64, y: f64) -> PolarPoint {
    to_polar_with_centre(x, y, CENTRE_RADIUS)
}

/// 指定中心死区半径进行转换
pub fn to_polar_with_centre(x: f64, y: f64, centre_radius: f64) -> PolarPoint {
    let radius = (x * x + y * y).sqrt().min(1.0);
    if radius <= centre_radius || radius == 0.0 {
        return PolarPoint { radius, angle: 0.0 };
    }

    let sx = if x < 0.0 { -1.0 } else { 1.0 };
    let sy = if y < 0.0 { -1.0 } else { 1.0 };
    let ss = sx * sy;

    // 归一化的 atan(x / y)，落在 [-0.5, 0.5]
    let tangent = if x.abs() > y.abs() {
        ss * 0.5 - (y / x).atan() / PI
    } else {
        (x / y).atan() / PI
    };
    // 第一象限 0，下半平面 1，第二象限（x < 0, y >= 0）2
    let offset = ((1.0 - sx) + (1.0 - ss)) / 2.0;

    let mut angle = (offset + tangent) / 2.0;
    if angle >= 1.0 {
        angle -= 1.0;
    }
    PolarPoint { radius, angle }
}
