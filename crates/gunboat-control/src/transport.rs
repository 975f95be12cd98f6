//! 传输能力接口
//!
//! 服务端（[`ConnectionSource`]）阻塞等待新连接，每个连接产出一个
//! [`EventDecoder`]；解码器阻塞读取并产出 [`GestureEvent`]。两者都提供
//! [`Interrupter`]，用于在关闭时唤醒阻塞中的线程。
//!
//! 所有方法取 `&self`：解码器同时被连接线程（读取）和控制器（角色回写、
//! 中断）访问，实现者自行管理内部可变性。

use crate::error::ControlError;
use gunboat_protocol::{GestureEvent, Role};
use std::fmt;
use std::sync::Arc;

/// 唤醒阻塞中的 `accept` / `next_event`
#[derive(Clone)]
pub struct Interrupter(Arc<dyn Fn() + Send + Sync>);

impl Interrupter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn interrupt(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Interrupter")
    }
}

/// 连接源（服务端能力）
pub trait ConnectionSource: Send + Sync {
    /// 打开接收端，服务端启动时调用一次
    ///
    /// 失败时服务端不会启动，控制器继续运行。
    fn open(&self) -> Result<(), ControlError> {
        Ok(())
    }

    /// 阻塞等待下一个连接
    fn accept(&self) -> Result<Box<dyn EventDecoder>, ControlError>;

    fn interrupter(&self) -> Interrupter;

    /// 日志中使用的名称
    fn name(&self) -> String;
}

/// 连接解码器（监听端能力）
pub trait EventDecoder: Send + Sync {
    /// 阻塞读取下一个事件；对端有序关闭时返回 `Ok(None)`
    fn next_event(&self) -> Result<Option<GestureEvent>, ControlError>;

    /// 通知设备当前角色（例如改变按钮颜色）
    fn on_role(&self, role: Role) -> Result<(), ControlError>;

    fn interrupter(&self) -> Interrupter;

    /// 对端描述，用于日志
    fn peer(&self) -> String;
}
