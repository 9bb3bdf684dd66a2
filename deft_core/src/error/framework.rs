//! Deft 框架核心错误类型
//!
//! 区分三类故障：调用方违反契约（`NoMatch`、`Underflow`、`ReadPending`、
//! `InvalidDelimiter`、`Closed`），单个连接的 I/O 故障（`ConnectionReset`、
//! `ResourceExhausted`、`StaleCallback`），以及 Reactor 级故障（`Reactor`）。

use super::context::ErrorContext;
use std::io;
use thiserror::Error;

/// Deft 框架核心错误类型
#[derive(Error, Debug)]
pub enum DeftError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 在已关闭的连接上发起操作
    #[error("连接已关闭")]
    Closed,

    /// 缓冲区中没有完整的分隔符帧
    #[error("缓冲区中没有匹配的分隔符")]
    NoMatch,

    /// 请求的字节数超过已缓冲的字节数
    #[error("缓冲区下溢: 请求 {requested} 字节, 仅有 {available} 字节")]
    Underflow { requested: usize, available: usize },

    /// 缓冲区增长超过上限
    #[error("缓冲区容量耗尽: 需要 {requested} 字节, 上限 {limit} 字节")]
    ResourceExhausted { requested: usize, limit: usize },

    /// 对端关闭或重置连接
    #[error("连接被重置: {0}")]
    ConnectionReset(String),

    /// 连接关闭时仍有未完成的读取
    #[error("连接关闭时读取仍未完成")]
    StaleCallback,

    /// 分隔符为空
    #[error("分隔符不能为空")]
    InvalidDelimiter,

    /// 同一连接上已有未完成的读取
    #[error("已有未完成的读取")]
    ReadPending,

    /// Reactor 注册或选择器错误
    #[error("Reactor 错误: {0}")]
    Reactor(String),

    /// 带上下文的错误
    #[error("{1}: {0}")]
    WithContext(#[source] Box<DeftError>, ErrorContext),
}

impl DeftError {
    /// 获取错误类型
    pub fn kind(&self) -> DeftErrorKind {
        match self {
            DeftError::Io(_) => DeftErrorKind::Io,
            DeftError::Config(_) => DeftErrorKind::Config,
            DeftError::Closed => DeftErrorKind::Closed,
            DeftError::NoMatch => DeftErrorKind::NoMatch,
            DeftError::Underflow { .. } => DeftErrorKind::Underflow,
            DeftError::ResourceExhausted { .. } => DeftErrorKind::ResourceExhausted,
            DeftError::ConnectionReset(_) => DeftErrorKind::ConnectionReset,
            DeftError::StaleCallback => DeftErrorKind::StaleCallback,
            DeftError::InvalidDelimiter => DeftErrorKind::InvalidDelimiter,
            DeftError::ReadPending => DeftErrorKind::ReadPending,
            DeftError::Reactor(_) => DeftErrorKind::Reactor,
            DeftError::WithContext(inner, _) => inner.kind(),
        }
    }

    /// 是否为单个连接的故障（应关闭该连接，而不是终止 Reactor）
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self.kind(),
            DeftErrorKind::Io
                | DeftErrorKind::ConnectionReset
                | DeftErrorKind::ResourceExhausted
        )
    }

    /// 添加上下文信息
    pub fn with_context<C>(self, context: C) -> Self
    where
        C: Into<ErrorContext>,
    {
        DeftError::WithContext(Box::new(self), context.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        DeftError::Config(msg.into())
    }

    /// 创建连接重置错误
    pub fn reset(msg: impl Into<String>) -> Self {
        DeftError::ConnectionReset(msg.into())
    }

    /// 创建 Reactor 错误
    pub fn reactor(msg: impl Into<String>) -> Self {
        DeftError::Reactor(msg.into())
    }
}

/// 错误类型分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeftErrorKind {
    /// IO 错误
    Io,
    /// 配置错误
    Config,
    /// 连接已关闭
    Closed,
    /// 无匹配分隔符
    NoMatch,
    /// 缓冲区下溢
    Underflow,
    /// 缓冲区容量耗尽
    ResourceExhausted,
    /// 连接被重置
    ConnectionReset,
    /// 关闭时的未完成读取
    StaleCallback,
    /// 非法分隔符
    InvalidDelimiter,
    /// 重复读取
    ReadPending,
    /// Reactor 错误
    Reactor,
}
