//! 控制层错误类型

use thiserror::Error;

/// 连接与传输错误
#[derive(Error, Debug)]
pub enum ControlError {
    /// 传输层读取或接受连接失败
    #[error("Connection fault: {0}")]
    ConnectionFault(String),

    /// 无法解析的消息
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 连接源无法打开接收端
    #[error("No receiver: {0}")]
    NoReceiver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
