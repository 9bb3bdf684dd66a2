//! Reactor 模式实现
//!
//! 基于 mio 的单线程 Reactor：就绪等待、处理器分发和连接接受。

pub mod acceptor;
pub mod handler;
pub mod reactor;

// 重新导出主要类型
pub use acceptor::Acceptor;
pub use handler::{EventHandler, Readiness};
pub use reactor::{Reactor, WeakReactor};
