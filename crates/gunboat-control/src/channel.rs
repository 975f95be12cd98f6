//! 进程内通道传输
//!
//! 用 `crossbeam-channel` 模拟远端控制器：[`ChannelConnector`] 发起连接，
//! 得到的 [`ChannelClient`] 发送手势并接收角色回写。用于无外设运行与测试。

use crate::error::ControlError;
use crate::transport::{ConnectionSource, EventDecoder, Interrupter};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use gunboat_protocol::{GestureAction, GestureEvent, Role};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Incoming {
    Connection(ChannelDecoder),
    Wake,
}

enum ClientMessage {
    Event(GestureEvent),
    Close,
}

/// 通道连接源
pub struct ChannelSource {
    incoming: Receiver<Incoming>,
    wake: Sender<Incoming>,
}

/// 向 [`ChannelSource`] 发起连接
#[derive(Clone)]
pub struct ChannelConnector {
    sender: Sender<Incoming>,
    next_peer: Arc<AtomicUsize>,
}

impl ChannelSource {
    pub fn new() -> (Self, ChannelConnector) {
        let (sender, incoming) = unbounded();
        let source = Self {
            incoming,
            wake: sender.clone(),
        };
        let connector = ChannelConnector {
            sender,
            next_peer: Arc::new(AtomicUsize::new(0)),
        };
        (source, connector)
    }
}

impl ConnectionSource for ChannelSource {
    fn accept(&self) -> Result<Box<dyn EventDecoder>, ControlError> {
        match self.incoming.recv() {
            Ok(Incoming::Connection(decoder)) => Ok(Box::new(decoder)),
            Ok(Incoming::Wake) | Err(_) => {
                Err(ControlError::ConnectionFault("source closed".to_string()))
            },
        }
    }

    fn interrupter(&self) -> Interrupter {
        let wake = self.wake.clone();
        Interrupter::new(move || {
            let _ = wake.send(Incoming::Wake);
        })
    }

    fn name(&self) -> String {
        "channel".to_string()
    }
}

impl ChannelConnector {
    /// 建立一个新连接
    pub fn connect(&self) -> Result<ChannelClient, ControlError> {
        let (events_tx, events_rx) = unbounded();
        let (roles_tx, roles_rx) = unbounded();
        let peer = format!("channel-{}", self.next_peer.fetch_add(1, Ordering::Relaxed));
        let decoder = ChannelDecoder {
            events: events_rx,
            wake: events_tx.clone(),
            roles: roles_tx,
            peer,
        };
        self.sender
            .send(Incoming::Connection(decoder))
            .map_err(|_| ControlError::ConnectionFault("source closed".to_string()))?;
        Ok(ChannelClient {
            events: events_tx,
            roles: roles_rx,
        })
    }
}

/// 通道连接的服务端一侧
pub struct ChannelDecoder {
    events: Receiver<ClientMessage>,
    wake: Sender<ClientMessage>,
    roles: Sender<Role>,
    peer: String,
}

impl EventDecoder for ChannelDecoder {
    fn next_event(&self) -> Result<Option<GestureEvent>, ControlError> {
        match self.events.recv() {
            Ok(ClientMessage::Event(event)) => Ok(Some(event)),
            Ok(ClientMessage::Close) | Err(_) => Ok(None),
        }
    }

    fn on_role(&self, role: Role) -> Result<(), ControlError> {
        // 客户端已断开时由读取端结束连接
        let _ = self.roles.send(role);
        Ok(())
    }

    fn interrupter(&self) -> Interrupter {
        let wake = self.wake.clone();
        Interrupter::new(move || {
            let _ = wake.send(ClientMessage::Close);
        })
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// 通道连接的客户端一侧
///
/// 丢弃时自动关闭连接。
pub struct ChannelClient {
    events: Sender<ClientMessage>,
    roles: Receiver<Role>,
}

impl ChannelClient {
    pub fn send(&self, action: GestureAction, x: f64, y: f64) -> Result<(), ControlError> {
        self.events
            .send(ClientMessage::Event(GestureEvent::new(action, x, y)))
            .map_err(|_| ControlError::ConnectionFault("connection closed".to_string()))
    }

    pub fn press(&self, x: f64, y: f64) -> Result<(), ControlError> {
        self.send(GestureAction::Press, x, y)
    }

    pub fn move_to(&self, x: f64, y: f64) -> Result<(), ControlError> {
        self.send(GestureAction::Move, x, y)
    }

    pub fn lift(&self, x: f64, y: f64) -> Result<(), ControlError> {
        self.send(GestureAction::Lift, x, y)
    }

    pub fn double(&self, x: f64, y: f64) -> Result<(), ControlError> {
        self.send(GestureAction::Double, x, y)
    }

    /// 等待下一次角色回写
    pub fn wait_role(&self, timeout: Duration) -> Option<Role> {
        match self.roles.recv_timeout(timeout) {
            Ok(role) => Some(role),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn close(&self) {
        let _ = self.events.send(ClientMessage::Close);
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_exchange() {
        let (source, connector) = ChannelSource::new();
        let client = connector.connect().unwrap();
        let decoder = source.accept().unwrap();
        assert_eq!(decoder.peer(), "channel-0");

        client.press(0.1, 0.2).unwrap();
        assert_eq!(
            decoder.next_event().unwrap(),
            Some(GestureEvent::new(GestureAction::Press, 0.1, 0.2))
        );

        decoder.on_role(Role::Navigate).unwrap();
        assert_eq!(client.wait_role(Duration::from_secs(1)), Some(Role::Navigate));

        drop(client);
        assert_eq!(decoder.next_event().unwrap(), None);
    }

    #[test]
    fn test_interrupters() {
        let (source, connector) = ChannelSource::new();
        let _client = connector.connect().unwrap();
        let decoder = source.accept().unwrap();

        decoder.interrupter().interrupt();
        assert_eq!(decoder.next_event().unwrap(), None);

        source.interrupter().interrupt();
        assert!(matches!(source.accept(), Err(ControlError::ConnectionFault(_))));
    }
}
