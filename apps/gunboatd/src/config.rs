//! 守护进程配置
//!
//! TOML 文件，所有字段都有默认值；命令行参数在加载后覆盖文件中的值。

use anyhow::{Context, Result, ensure};
use gunboat_driver::{BoatTuning, SequencerConfig, TurretAddress};
use gunboat_protocol::TargetingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 扩展芯片总线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusConfig {
    /// 内存总线（无硬件运行）
    #[default]
    Mock,
    /// Linux `/dev/i2c-N`
    I2c { bus: u8 },
}

/// 单个炮塔
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurretConfig {
    /// 带符号尺寸：正值 `[0, size]`，负值 `[size, -size]`
    pub size: i32,
    #[serde(flatten)]
    pub address: TurretAddress,
}

impl TurretConfig {
    fn new(size: i32, expander: u8, bank_b: bool, high_nibble: bool) -> Self {
        Self {
            size,
            address: TurretAddress {
                expander,
                bank_b,
                high_nibble,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// TCP 行协议监听地址
    pub listen: Vec<String>,
    pub bus: BusConfig,
    pub sequencer: SequencerConfig,
    pub targeting: TargetingConfig,
    pub tuning: BoatTuning,
    pub turrets: Vec<TurretConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: vec!["0.0.0.0:5005".to_string()],
            bus: BusConfig::Mock,
            sequencer: SequencerConfig::default(),
            targeting: TargetingConfig::default(),
            tuning: BoatTuning::default(),
            // 两对舷侧炮塔，共用芯片 0 的四个半字节
            turrets: vec![
                TurretConfig::new(8, 0, false, false),
                TurretConfig::new(8, 0, true, false),
                TurretConfig::new(8, 0, false, true),
                TurretConfig::new(8, 0, true, true),
            ],
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.targeting.validate()?;
        ensure!(!self.turrets.is_empty(), "at least one turret must be configured");
        for (index, turret) in self.turrets.iter().enumerate() {
            ensure!(turret.size != 0, "turret {} has zero size", index);
        }
        for (index, turret) in self.turrets.iter().enumerate() {
            let clash = self.turrets[..index]
                .iter()
                .position(|other| other.address == turret.address);
            if let Some(other) = clash {
                anyhow::bail!("turrets {} and {} share the same port", other, index);
            }
        }
        Ok(())
    }
}
