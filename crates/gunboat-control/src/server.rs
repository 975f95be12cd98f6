//! 连接源线程
//!
//! 每个连接源一个线程：阻塞等待新连接，包装为 [`Listener`] 交给控制器。
//! 线程退出前的最后一个动作是通知控制器（`stopping`）。

use crate::controller::ConnectionController;
use crate::error::ControlError;
use crate::listener::Listener;
use crate::transport::ConnectionSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub struct Server {
    source: Box<dyn ConnectionSource>,
    id: AtomicUsize,
    ok: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl Server {
    pub fn new(source: impl ConnectionSource + 'static) -> Arc<Self> {
        let name = source.name();
        Arc::new(Self {
            source: Box::new(source),
            id: AtomicUsize::new(usize::MAX),
            ok: AtomicBool::new(false),
            thread: Mutex::new(None),
            name,
        })
    }

    pub fn id(&self) -> usize {
        self.id.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }

    /// 打开接收端并启动接受线程
    ///
    /// 接收端无法打开时返回 [`ControlError::NoReceiver`]，服务端保持停止状态。
    pub fn startup(
        self: &Arc<Self>,
        id: usize,
        controller: &ConnectionController,
    ) -> Result<(), ControlError> {
        self.id.store(id, Ordering::Release);
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }

        if let Err(e) = self.source.open() {
            self.ok.store(false, Ordering::Release);
            return Err(match e {
                ControlError::NoReceiver(_) => e,
                other => ControlError::NoReceiver(other.to_string()),
            });
        }

        self.ok.store(true, Ordering::Release);
        let server = Arc::clone(self);
        let controller = controller.clone();
        let handle = thread::Builder::new()
            .name(format!("server-{}", id))
            .spawn(move || server.run(controller))
            .map_err(|e| {
                self.ok.store(false, Ordering::Release);
                ControlError::Io(e)
            })?;
        *thread = Some(handle);
        Ok(())
    }

    fn run(self: Arc<Self>, controller: ConnectionController) {
        info!("Server {} accepting on {}", self.id(), self.name);
        while self.is_running() {
            match self.source.accept() {
                Ok(decoder) => {
                    if !self.is_running() {
                        break;
                    }
                    let listener = Listener::new(decoder);
                    if let Err(e) = controller.connected(listener) {
                        warn!("Server {} could not start connection: {}", self.id(), e);
                    }
                },
                Err(e) => {
                    if self.is_running() {
                        warn!("Server {} accept failed: {}", self.id(), e);
                    }
                    break;
                },
            }
        }
        self.ok.store(false, Ordering::Release);
        debug!("Server {} stopped", self.id());
        controller.stopping(self.id());
    }

    /// 请求停止：清除运行标志并唤醒阻塞的 accept。可重复调用。
    pub fn shutdown(&self) {
        self.ok.store(false, Ordering::Release);
        self.source.interrupter().interrupt();
    }

    /// 等待接受线程退出；在接受线程自身上调用时直接返回
    pub fn join(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Server thread {} panicked", self.name);
            }
        }
    }
}
