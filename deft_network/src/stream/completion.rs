//! 读取完成回调
//!
//! 每个未完成的读取恰好收到一次结果：成功时是帧，失败时是错误。

use bytes::Bytes;
use deft_core::DeftError;
use std::fmt;

/// 一次读取的结果
pub type ReadResult = Result<Bytes, DeftError>;

/// 一次性完成回调
///
/// `succeed`/`fail` 会消耗自身；如果从未调用就被丢弃，会以
/// [`DeftError::StaleCallback`] 完成，保证回调不会被静默丢掉。
pub struct Completion {
    callback: Option<Box<dyn FnOnce(ReadResult)>>,
}

impl Completion {
    /// 包装回调
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(ReadResult) + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// 以帧完成
    pub fn succeed(self, frame: Bytes) {
        self.complete(Ok(frame));
    }

    /// 以错误完成
    pub fn fail(self, error: DeftError) {
        self.complete(Err(error));
    }

    /// 以给定结果完成
    pub fn complete(mut self, result: ReadResult) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(DeftError::StaleCallback));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("armed", &self.callback.is_some())
            .finish()
    }
}
