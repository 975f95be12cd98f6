//! # Gunboat Driver
//!
//! 执行器驱动层：步进时序、炮塔、电机与船体组装。
//!
//! ## 分层
//!
//! ```text
//! TriMotorBoat ──┬── Motor / Rudder ── PwmOutput
//!                └── Turret ── ActuatorSequencer ── Mcp23017 ── RegisterBus
//! ```
//!
//! 一片扩展芯片对应一个 [`ActuatorSequencer`]，由 [`ExpanderRegistry`]
//! 创建并以 `Arc` 共享给绑定到该芯片的所有炮塔。

pub mod boat;
pub mod error;
pub mod metrics;
pub mod motor;
pub mod phase;
pub mod registry;
pub mod sequencer;
pub mod turret;

pub use boat::{BoatTuning, ThrustMix, TriMotorBoat, TriMotorBoatBuilder};
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, SequencerMetrics};
pub use motor::{Motor, PwmOutput, Rudder, SimulatedPwm};
pub use registry::ExpanderRegistry;
pub use sequencer::{
    ActuatorSequencer, BufferedSequencer, DirectSequencer, Port, SequencerConfig, SequencerMode,
};
pub use turret::{Turret, TurretAddress};
