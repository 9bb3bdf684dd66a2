//! 分隔符分帧器
//!
//! 在可增长的 [`ByteStore`] 之上按分隔符切帧。搜索是可恢复的：
//! `search_pos` 之前的位置已经证明不匹配，后续追加数据时不会重扫。
//!
//! ```text
//!  0                 search_pos           len        capacity
//!  |-- 已确认无匹配 --|---- 待扫描 ----|---- 空闲 ----|
//! ```
//!
//! 返回的帧是拷贝，之后的压缩不会影响它们。

use crate::buffer::store::ByteStore;
use bytes::Bytes;
use deft_core::{DeftError, Result};

/// 在 `haystack[from..]` 中查找 `delimiter`
///
/// 找到时返回 `Ok(起始位置)`；否则返回 `Err(下一次应从哪里继续)`，
/// 即第一个还可能容纳完整分隔符的位置。
pub(crate) fn scan(haystack: &[u8], from: usize, delimiter: &[u8]) -> std::result::Result<usize, usize> {
    let width = delimiter.len();
    if haystack.len() < width {
        return Err(from);
    }
    let end = haystack.len() - width;
    let mut pos = from;
    while pos <= end {
        if &haystack[pos..pos + width] == delimiter {
            return Ok(pos);
        }
        pos += 1;
    }
    Err(pos)
}

/// 分隔符分帧器
#[derive(Debug)]
pub struct Tokenizer {
    store: ByteStore,
    delimiter: Vec<u8>,
    search_pos: usize,
    has_next: bool,
}

impl Tokenizer {
    /// 创建分帧器，空分隔符返回 [`DeftError::InvalidDelimiter`]
    pub fn new(capacity: usize, delimiter: &[u8]) -> Result<Self> {
        Self::from_store(ByteStore::with_capacity(capacity), delimiter)
    }

    /// 创建带容量上限的分帧器
    pub fn with_limit(capacity: usize, delimiter: &[u8], limit: usize) -> Result<Self> {
        Self::from_store(ByteStore::with_limit(capacity, limit), delimiter)
    }

    fn from_store(store: ByteStore, delimiter: &[u8]) -> Result<Self> {
        if delimiter.is_empty() {
            return Err(DeftError::InvalidDelimiter);
        }
        Ok(Self {
            store,
            delimiter: delimiter.to_vec(),
            search_pos: 0,
            has_next: false,
        })
    }

    /// 当前分隔符
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// 更换分隔符
    ///
    /// 与当前分隔符相同时不做任何事；不同时重置搜索位置和就绪缓存，
    /// 因为旧分隔符下的搜索结果对新分隔符没有意义。
    pub fn set_delimiter(&mut self, delimiter: &[u8]) -> Result<()> {
        if delimiter.is_empty() {
            return Err(DeftError::InvalidDelimiter);
        }
        if self.delimiter != delimiter {
            self.delimiter = delimiter.to_vec();
            self.search_pos = 0;
            self.has_next = false;
        }
        Ok(())
    }

    /// 追加一段数据，不触发搜索
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.store.extend(chunk)
    }

    /// 已缓冲的字节数
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// 内部存储的物理容量
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// 是否已缓冲了一个完整的分隔符帧
    ///
    /// 只有未扫描字节数不少于分隔符长度时才会搜索；结果一直缓存到下一次消费。
    pub fn has_next(&mut self) -> bool {
        if !self.has_next && self.unscanned() >= self.delimiter.len() {
            self.search();
        }
        self.has_next
    }

    /// 取出下一帧（包含分隔符）
    pub fn next(&mut self) -> Result<Bytes> {
        if !self.has_next() {
            return Err(DeftError::NoMatch);
        }
        Ok(self.consume(self.search_pos + self.delimiter.len()))
    }

    /// 不看分隔符，取出恰好 `n` 个字节
    pub fn slice(&mut self, n: usize) -> Result<Bytes> {
        if n > self.size() {
            return Err(DeftError::Underflow {
                requested: n,
                available: self.size(),
            });
        }
        Ok(self.consume(n))
    }

    fn unscanned(&self) -> usize {
        self.store.len().saturating_sub(self.search_pos)
    }

    fn search(&mut self) {
        match scan(self.store.as_slice(), self.search_pos, &self.delimiter) {
            Ok(found) => {
                self.search_pos = found;
                self.has_next = true;
            }
            Err(resume) => self.search_pos = resume,
        }
    }

    fn consume(&mut self, n: usize) -> Bytes {
        let frame = Bytes::copy_from_slice(&self.store.as_slice()[..n]);
        self.store.compact(n);
        self.search_pos = 0;
        self.has_next = false;
        frame
    }
}
