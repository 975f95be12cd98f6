//! # Gunboat Protocol
//!
//! 遥控船的手势、瞄准与船体能力定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `gesture`: 手势事件与连接角色
//! - `gun`: 炮塔步进范围
//! - `polar`: 笛卡尔坐标到极坐标的映射
//! - `topology`: 炮塔布局推导
//! - `targeting`: 瞄准引擎（手势 → 炮塔/数值）
//! - `boat`: `Boat` / `BoatObserver` 能力接口
//! - `error`: 配置与船体错误类型
//!
//! ## 坐标约定
//!
//! 手势坐标 `x`、`y` 均在 `[-1, 1]` 内，`+y` 指向船头，`+x` 指向右舷。
//! 角度以"圈"为单位（`[0, 1)`），从 `+y` 顺时针计量。

pub mod boat;
pub mod error;
pub mod gesture;
pub mod gun;
pub mod polar;
pub mod targeting;
pub mod topology;

// 重新导出常用类型
pub use boat::{Boat, BoatObserver, BoatReport};
pub use error::{BoatError, ConfigurationError};
pub use gesture::{GestureAction, GestureEvent, Role};
pub use gun::GunRange;
pub use polar::{PolarPoint, to_polar};
pub use targeting::{TargetSelection, TargetValue, TargetingConfig, TargetingEngine};
pub use topology::TurretTopology;
