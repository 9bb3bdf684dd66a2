//! 事件处理器接口
//!
//! Reactor 只认识 [`EventHandler`]：每个注册的通道对应一个处理器，
//! 每轮就绪等待后对每个就绪通道调用一次 `handle_events`。

use mio::event::Event;
use std::fmt;

/// 通道在一轮等待中的就绪状态
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    readable: bool,
    writable: bool,
}

impl Readiness {
    /// 只读就绪
    pub const READABLE: Readiness = Readiness { readable: true, writable: false };
    /// 只写就绪
    pub const WRITABLE: Readiness = Readiness { readable: false, writable: true };

    pub fn new(readable: bool, writable: bool) -> Self {
        Self { readable, writable }
    }

    /// 从 mio 事件构造
    ///
    /// 读端关闭和错误按可读处理，让处理器在下一次接收时观察到 EOF 或错误。
    pub fn from_event(event: &Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed() || event.is_error(),
            writable: event.is_writable() || event.is_write_closed(),
        }
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// 合并同一令牌在一轮中的多个事件
    pub fn merge(self, other: Readiness) -> Readiness {
        Readiness {
            readable: self.readable || other.readable,
            writable: self.writable || other.writable,
        }
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.readable, self.writable) {
            (true, true) => f.write_str("READABLE | WRITABLE"),
            (true, false) => f.write_str("READABLE"),
            (false, true) => f.write_str("WRITABLE"),
            (false, false) => f.write_str("NONE"),
        }
    }
}

/// 事件处理器
///
/// 处理器自行处理单连接故障（通常是关闭自身），不向 Reactor 传播。
/// 方法接收 `&self`：Reactor 通过共享引用调度，可变状态由实现方用
/// `RefCell`/`Cell` 管理，调用回调前必须释放借用。
pub trait EventHandler {
    /// 处理一次就绪通知
    fn handle_events(&self, readiness: Readiness);

    /// Reactor 销毁时对仍注册的处理器调用一次
    ///
    /// 实现应释放通道并完成所有未完成的回调，此时 Reactor 已不可用。
    fn shutdown(&self) {}
}
