//! # Gunboat Control
//!
//! 远程控制连接层：连接源接受连接，每个连接一个线程解码手势，
//! [`ConnectionController`] 按连接编号分配角色并路由到船体。
//!
//! ```text
//! ConnectionSource ── Server ──connected──▶ ConnectionController ──▶ Boat
//!                      │                      ▲        │
//!                      └── Listener ─dispatch─┘        └── TargetingEngine
//! ```
//!
//! 传输层实现：[`tcp`]（文本行协议）与 [`channel`]（进程内通道）。

pub mod channel;
pub mod controller;
pub mod error;
pub mod line;
pub mod listener;
pub mod observer;
pub mod server;
pub mod tcp;
pub mod transport;

pub use channel::{ChannelClient, ChannelConnector, ChannelSource};
pub use controller::{ConnectionController, Slot};
pub use error::ControlError;
pub use listener::Listener;
pub use observer::TracingObserver;
pub use server::Server;
pub use tcp::{TcpDecoder, TcpSource};
pub use transport::{ConnectionSource, EventDecoder, Interrupter};
