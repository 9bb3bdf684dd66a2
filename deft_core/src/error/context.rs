//! 错误上下文
//!
//! 为连接级错误附加来源信息（哪个注册令牌、哪个对端）。

use std::fmt;
use std::net::SocketAddr;

/// 错误上下文信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorContext {
    /// 出错的连接：Reactor 令牌与可选的对端地址
    Connection {
        token: usize,
        peer: Option<SocketAddr>,
    },
    /// 键值对上下文
    KeyValue(String, String),
    /// 自定义上下文
    Custom(String),
}

impl ErrorContext {
    /// 创建连接上下文
    pub fn connection(token: usize, peer: Option<SocketAddr>) -> Self {
        ErrorContext::Connection { token, peer }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::Connection { token, peer: Some(peer) } => {
                write!(f, "连接 #{} ({})", token, peer)
            }
            ErrorContext::Connection { token, peer: None } => write!(f, "连接 #{}", token),
            ErrorContext::KeyValue(key, value) => write!(f, "{}: {}", key, value),
            ErrorContext::Custom(msg) => f.write_str(msg),
        }
    }
}

impl From<(&str, &str)> for ErrorContext {
    fn from((key, value): (&str, &str)) -> Self {
        ErrorContext::KeyValue(key.to_string(), value.to_string())
    }
}

impl From<String> for ErrorContext {
    fn from(msg: String) -> Self {
        ErrorContext::Custom(msg)
    }
}

impl From<&str> for ErrorContext {
    fn from(msg: &str) -> Self {
        ErrorContext::Custom(msg.to_string())
    }
}
