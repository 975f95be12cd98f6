//! 连接监听线程
//!
//! 每个连接一个线程：阻塞读取事件，按当前连接编号交给控制器路由。
//! 连接编号可被双击换位改写，因此每个事件都重新读取一次。
//! 线程退出前的最后一个动作是通知控制器释放该连接，且只通知一次。
//!
//! `startup` 不持有控制器的锁调用；关闭后的连接拒绝再次启动。

use crate::controller::ConnectionController;
use crate::error::ControlError;
use crate::transport::EventDecoder;
use gunboat_protocol::Role;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// 单个连接
pub struct Listener {
    decoder: Arc<dyn EventDecoder>,
    id: AtomicUsize,
    ok: AtomicBool,
    /// 已关闭，不再启动
    closed: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
    peer: String,
}

impl Listener {
    pub fn new(decoder: Box<dyn EventDecoder>) -> Arc<Self> {
        let peer = decoder.peer();
        Arc::new(Self {
            decoder: Arc::from(decoder),
            id: AtomicUsize::new(0),
            ok: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            thread: Mutex::new(None),
            peer,
        })
    }

    /// 当前连接编号
    pub fn id(&self) -> usize {
        self.id.load(Ordering::Acquire)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_running(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }

    /// 绑定连接编号并通知设备角色；首次调用时启动读取线程
    ///
    /// 角色通知可能阻塞在对端上，调用方不得持有控制器的锁。
    pub fn startup(
        self: &Arc<Self>,
        id: usize,
        controller: &ConnectionController,
    ) -> Result<(), ControlError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ControlError::ConnectionFault(format!("{} is closed", self.peer)));
        }
        self.id.store(id, Ordering::Release);

        let role = Role::from_id(id);
        if let Err(e) = self.decoder.on_role(role) {
            warn!("Failed to send role {:?} to {}: {}", role, self.peer, e);
        }

        // 与 shutdown 在同一把锁下判定，关闭之后不会再起线程
        let mut thread = self.thread.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(ControlError::ConnectionFault(format!("{} is closed", self.peer)));
        }
        self.ok.store(true, Ordering::Release);
        if thread.is_none() {
            let listener = Arc::clone(self);
            let controller = controller.clone();
            let handle = thread::Builder::new()
                .name(format!("listener-{}", id))
                .spawn(move || listener.run(controller))
                .map_err(|e| {
                    self.ok.store(false, Ordering::Release);
                    ControlError::Io(e)
                })?;
            *thread = Some(handle);
        }
        Ok(())
    }

    fn run(self: Arc<Self>, controller: ConnectionController) {
        debug!("Listener for {} started", self.peer);
        while self.is_running() {
            match self.decoder.next_event() {
                Ok(Some(event)) => {
                    if !self.is_running() {
                        break;
                    }
                    controller.dispatch(self.id(), event);
                },
                Ok(None) => {
                    debug!("{} closed the connection", self.peer);
                    break;
                },
                Err(e) => {
                    if self.is_running() {
                        warn!("Connection {} ({}) failed: {}", self.id(), self.peer, e);
                    }
                    break;
                },
            }
        }
        self.ok.store(false, Ordering::Release);
        controller.listener_exited(&self);
    }

    /// 请求停止：清除运行标志并唤醒阻塞的读取。可重复调用。
    pub fn shutdown(&self) {
        {
            let _thread = self.thread.lock();
            self.closed.store(true, Ordering::Release);
            if self.ok.swap(false, Ordering::AcqRel) {
                info!("Closing connection {} ({})", self.id(), self.peer);
            }
        }
        self.decoder.interrupter().interrupt();
    }

    /// 等待读取线程退出；在读取线程自身上调用时直接返回
    pub fn join(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Listener thread for {} panicked", self.peer);
            }
        }
    }
}
