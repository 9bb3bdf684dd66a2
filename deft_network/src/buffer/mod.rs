//! 入站缓冲
//!
//! 可增长字节存储和基于它的分隔符分帧器。

pub mod store;
pub mod tokenizer;

// 重新导出主要类型
pub use store::ByteStore;
pub use tokenizer::Tokenizer;
