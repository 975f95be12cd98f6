//! TCP 行协议传输
//!
//! [`TcpSource`] 在 `open()` 时绑定地址；中断时置关闭标志并向自身发起一次
//! 连接以唤醒阻塞的 `accept`。[`TcpDecoder`] 逐行读取，中断时关闭套接字。

use crate::error::ControlError;
use crate::line::{self, LineCommand};
use crate::transport::{ConnectionSource, EventDecoder, Interrupter};
use gunboat_protocol::{GestureEvent, Role};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// TCP 连接源
pub struct TcpSource {
    address: String,
    listener: OnceLock<TcpListener>,
    local: Arc<OnceLock<SocketAddr>>,
    closed: Arc<AtomicBool>,
}

impl TcpSource {
    /// 创建连接源，`address` 形如 `0.0.0.0:5005`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            listener: OnceLock::new(),
            local: Arc::new(OnceLock::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 立即绑定，之后的 `open()` 不再重复绑定
    pub fn bind(address: impl Into<String>) -> Result<Self, ControlError> {
        let source = Self::new(address);
        source.open()?;
        Ok(source)
    }

    /// 实际绑定的地址（端口 0 时由系统分配）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local.get().copied()
    }
}

/// 把未指定地址换成回环地址，用于自连接唤醒
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

impl ConnectionSource for TcpSource {
    fn open(&self) -> Result<(), ControlError> {
        if self.listener.get().is_some() {
            return Ok(());
        }
        let listener = TcpListener::bind(&self.address)
            .map_err(|e| ControlError::NoReceiver(format!("{}: {}", self.address, e)))?;
        let local = listener.local_addr()?;
        let _ = self.local.set(local);
        let _ = self.listener.set(listener);
        debug!("TCP source bound to {}", local);
        Ok(())
    }

    fn accept(&self) -> Result<Box<dyn EventDecoder>, ControlError> {
        let listener = self
            .listener
            .get()
            .ok_or_else(|| ControlError::NoReceiver(self.address.clone()))?;
        let (stream, peer) = listener
            .accept()
            .map_err(|e| ControlError::ConnectionFault(e.to_string()))?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ControlError::ConnectionFault("source closed".to_string()));
        }
        Ok(Box::new(TcpDecoder::new(stream, peer.to_string())?))
    }

    fn interrupter(&self) -> Interrupter {
        let closed = self.closed.clone();
        let local = self.local.clone();
        Interrupter::new(move || {
            closed.store(true, Ordering::Release);
            if let Some(addr) = local.get() {
                let _ = TcpStream::connect(wake_address(*addr));
            }
        })
    }

    fn name(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// 单个 TCP 连接
pub struct TcpDecoder {
    reader: Mutex<BufReader<TcpStream>>,
    writer: Mutex<TcpStream>,
    socket: Arc<TcpStream>,
    peer: String,
}

impl TcpDecoder {
    pub fn new(stream: TcpStream, peer: String) -> Result<Self, ControlError> {
        let writer = stream.try_clone()?;
        let socket = Arc::new(stream.try_clone()?);
        Ok(Self {
            reader: Mutex::new(BufReader::new(stream)),
            writer: Mutex::new(writer),
            socket,
            peer,
        })
    }
}

impl EventDecoder for TcpDecoder {
    fn next_event(&self) -> Result<Option<GestureEvent>, ControlError> {
        let mut reader = self.reader.lock();
        let mut buffer = String::new();
        loop {
            buffer.clear();
            let read = reader
                .read_line(&mut buffer)
                .map_err(|e| ControlError::ConnectionFault(e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            if buffer.trim().is_empty() {
                continue;
            }
            trace!("{} <- {}", self.peer, buffer.trim_end());
            return match line::parse_line(&buffer)? {
                LineCommand::Event(event) => Ok(Some(event)),
                LineCommand::Close => Ok(None),
            };
        }
    }

    fn on_role(&self, role: Role) -> Result<(), ControlError> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line::format_role(role))?;
        writer.flush()?;
        Ok(())
    }

    fn interrupter(&self) -> Interrupter {
        let socket = self.socket.clone();
        Interrupter::new(move || {
            let _ = socket.shutdown(Shutdown::Both);
        })
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}
