//! Deft 核心错误类型
//!
//! 提供 Reactor、连接流和分帧器共用的错误定义。

pub mod error;

// 导出主要类型到 crate root
pub use crate::error::{DeftError, DeftErrorKind, ErrorContext, Result};

// 预导出
pub mod prelude {
    pub use crate::error::{DeftError, DeftErrorKind, ErrorContext, Result};
}
