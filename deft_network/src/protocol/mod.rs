//! 协议模块
//!
//! 面向 `tokio_util::codec` 的分隔符编解码器。

pub mod codec;

// 重新导出主要类型
pub use codec::DelimiterCodec;
