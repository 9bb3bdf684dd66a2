//! Deft 网络层
//!
//! 单线程 Reactor、非阻塞 TCP 流和分隔符分帧。
//!
//! 所有类型都基于 `Rc`，只能在创建它们的线程上使用。

pub mod buffer;
#[cfg(feature = "codec")]
pub mod protocol;
pub mod reactor;
pub mod stream;

// 导出主要类型到 crate root
pub use crate::buffer::{ByteStore, Tokenizer};
#[cfg(feature = "codec")]
pub use crate::protocol::DelimiterCodec;
pub use crate::reactor::{Acceptor, EventHandler, Reactor, Readiness, WeakReactor};
pub use crate::stream::{Completion, IoStream, ReadResult, WriteQueue};
pub use mio::{Interest, Token};
// 重新导出 deft_core 的错误类型
pub use deft_core::{DeftError, Result};

// 预导出
pub mod prelude {
    pub use crate::reactor::{Acceptor, Reactor};
    pub use crate::stream::{IoStream, ReadResult};
    pub use deft_core::{DeftError, Result};
}
