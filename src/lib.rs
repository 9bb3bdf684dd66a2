//! # Deft - 单线程 Reactor 与分隔符帧流式 I/O
//!
//! Deft 在一个线程上用就绪选择机制多路复用所有 TCP 连接，
//! 以回调方式提供“读到分隔符为止”和按序写出。
//!
//! ## 特性
//!
//! - 基于 mio 的单线程 Reactor，无锁、无工作线程
//! - 可恢复的分隔符搜索，跨多次接收拼帧
//! - 出站写队列，部分写入按序续写
//! - `tokio_util::codec` 分隔符编解码器
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use deft::Server;
//!
//! fn main() -> deft::Result<()> {
//!     Server::bind("127.0.0.1:8080")
//!         .on_accept(|stream| {
//!             let echo = stream.clone();
//!             let _ = stream.read_until(b"\r\n", move |frame| {
//!                 if let Ok(frame) = frame {
//!                     let _ = echo.write(frame);
//!                 }
//!             });
//!         })
//!         .run()
//! }
//! ```
//!
//! ## 模块组织
//!
//! ### 配置模块
//! - ServerConfig - 监听地址配置
//! - ReactorConfig - Reactor 与缓冲配置
//!
//! ### 核心模块
//! - DeftError - 统一的框架错误
//! - ErrorContext - 错误上下文
//!
//! ### 网络模块
//! - Reactor - 单线程就绪分发
//! - IoStream - 非阻塞连接流
//! - Tokenizer - 分隔符分帧器

// ============================================================================
// Conditional Compilation Based on Features
// ============================================================================

// Server API
#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "server")]
pub use crate::server::{BoundServer, Server, ServerBuilder};

// ============================================================================
// Crate Re-exports (for advanced users)
// ============================================================================

#[cfg(feature = "server")]
pub use deft_config;

#[cfg(feature = "server")]
pub use deft_core;

#[cfg(feature = "server")]
pub use deft_network;

// ============================================================================
// Prelude Module
// ============================================================================

/// 预导出常用类型
///
/// 通过 `use deft::prelude::*;` 导入所有常用类型
pub mod prelude {
    // Common types
    pub use std::result::Result as StdResult;

    #[cfg(feature = "server")]
    pub use deft_config::{ConfigError, ReactorConfig, ServerConfig};

    #[cfg(feature = "server")]
    pub use deft_core::{DeftError, DeftErrorKind};

    #[cfg(feature = "server")]
    pub use deft_network::prelude::*;

    #[cfg(feature = "server")]
    pub use crate::server::{BoundServer, Server, ServerBuilder};
}

// ============================================================================
// Error Types
// ============================================================================

/// Deft 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// Deft 统一错误枚举
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 核心错误
    #[cfg(feature = "server")]
    #[error(transparent)]
    Core(#[from] deft_core::DeftError),

    /// 配置错误
    #[cfg(feature = "server")]
    #[error(transparent)]
    Config(#[from] deft_config::ConfigError),

    /// IO 错误
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 自定义错误
    #[error("{0}")]
    Custom(String),
}

// ============================================================================
// Version Information
// ============================================================================

/// Deft 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Deft 包名
pub const NAME: &str = env!("CARGO_PKG_NAME");
