//! 非阻塞流
//!
//! 连接的读写状态机、一次性读取回调和出站写队列。

pub mod completion;
pub mod stream;
pub mod write_queue;

// 重新导出主要类型
pub use completion::{Completion, ReadResult};
pub use stream::IoStream;
pub use write_queue::WriteQueue;
