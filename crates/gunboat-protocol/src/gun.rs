//! 炮塔步进范围

/// 炮塔的不可变步进范围
///
/// `steps = max - min + 1`，`mid` 为归中位置（通常为 0）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GunRange {
    pub steps: u32,
    pub min: i32,
    pub max: i32,
    pub mid: i32,
}

impl GunRange {
    /// 由上下界构造（`mid` 取 0）
    ///
    /// 调用方负责保证 `min <= max`；`TargetingEngine::new` 会再次校验。
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            steps: (max - min).unsigned_abs() + 1,
            min,
            max,
            mid: 0,
        }
    }

    /// 由带符号的尺寸构造
    ///
    /// - `size > 0`：范围 `[0, size]`（舷侧炮塔）
    /// - `size < 0`：范围 `[size, -size]`（中置炮塔，可双向旋转）
    pub fn from_size(size: i32) -> Self {
        if size < 0 {
            Self::new(size, -size)
        } else {
            Self::new(0, size)
        }
    }

    /// 跨度（`max - min`），用于三角布局判定
    pub fn span(&self) -> i32 {
        self.max - self.min
    }

    pub fn contains(&self, position: i32) -> bool {
        (self.min..=self.max).contains(&position)
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}
