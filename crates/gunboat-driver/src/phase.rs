//! 四相步进时序
//!
//! 单线圈（wave drive）驱动：每一步只有一个线圈通电，相位按
//! `0b0001 → 0b0010 → 0b0100 → 0b1000` 循环。第 `i` 步使用
//! `PHASES[i mod 4]`（欧几里得取模，负步数同样适用），因此位置与相位一一对应，
//! 任意起点出发都不会丢步。

/// 相位表
pub const PHASES: [u8; 4] = [0b0001, 0b0010, 0b0100, 0b1000];

/// 第 `step` 步的相位
pub fn phase_for(step: i32) -> u8 {
    PHASES[step.rem_euclid(PHASES.len() as i32) as usize]
}

/// 从 `start` 到 `stop`（含两端）的步进序列
pub fn step_path(start: i32, stop: i32) -> impl Iterator<Item = i32> {
    let forward = stop >= start;
    let count = (stop - start).unsigned_abs() as i32;
    (0..=count).map(move |i| if forward { start + i } else { start - i })
}

/// 从 `start` 到 `stop` 的相位序列
pub fn phase_path(start: i32, stop: i32) -> impl Iterator<Item = u8> {
    step_path(start, stop).map(phase_for)
}
