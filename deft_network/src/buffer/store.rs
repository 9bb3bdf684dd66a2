//! 可增长字节存储
//!
//! 连续、自有的入站字节区。容量只增不减，`compact` 把未消费的字节
//! 搬到偏移 0。

use deft_core::{DeftError, Result};

/// 平台最大可寻址大小
pub const PLATFORM_LIMIT: usize = isize::MAX as usize;

/// 可增长字节存储
///
/// 不变量：`len() <= capacity() <= limit()`（初始容量超过上限时按上限截断）。
#[derive(Debug)]
pub struct ByteStore {
    bytes: Vec<u8>,
    limit: usize,
}

impl ByteStore {
    /// 以给定初始容量创建，上限为平台最大值
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limit(capacity, PLATFORM_LIMIT)
    }

    /// 以给定初始容量和容量上限创建
    pub fn with_limit(capacity: usize, limit: usize) -> Self {
        let limit = limit.min(PLATFORM_LIMIT);
        Self {
            bytes: Vec::with_capacity(capacity.min(limit)),
            limit,
        }
    }

    /// 已保存的字节数
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 当前物理容量
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// 容量上限
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// 追加字节，必要时扩容
    pub fn extend(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let required = self
            .bytes
            .len()
            .checked_add(chunk.len())
            .ok_or(DeftError::ResourceExhausted {
                requested: usize::MAX,
                limit: self.limit,
            })?;
        self.ensure_capacity(required)?;
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    /// 保证容量至少为 `minimum`
    pub fn ensure_capacity(&mut self, minimum: usize) -> Result<()> {
        if minimum <= self.bytes.capacity() {
            return Ok(());
        }
        let target = grown_capacity(self.bytes.capacity(), minimum, self.limit)?;
        self.bytes
            .try_reserve_exact(target - self.bytes.len())
            .map_err(|_| DeftError::ResourceExhausted {
                requested: target,
                limit: self.limit,
            })
    }

    /// 丢弃前 `consumed` 个字节并把剩余字节移到偏移 0
    ///
    /// 之前基于偏移量的任何位置信息都随之失效。
    pub fn compact(&mut self, consumed: usize) {
        let consumed = consumed.min(self.bytes.len());
        let remaining = self.bytes.len() - consumed;
        self.bytes.copy_within(consumed.., 0);
        self.bytes.truncate(remaining);
    }

    /// 清空内容，保留容量
    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

/// 计算扩容后的容量：先翻倍（至少 +1），不够则直接取 `minimum`，
/// 最终不超过 `limit`
fn grown_capacity(current: usize, minimum: usize, limit: usize) -> Result<usize> {
    if minimum > limit {
        return Err(DeftError::ResourceExhausted {
            requested: minimum,
            limit,
        });
    }
    let doubled = current.saturating_add(1).saturating_mul(2);
    Ok(doubled.max(minimum).min(limit))
}
