//! 出站写队列
//!
//! 按写入顺序保存待发送的缓冲区。队首缓冲区带一个发送游标，
//! 部分写入只推进游标，整块发完才出队。

use bytes::Bytes;
use std::collections::VecDeque;
use std::io::{self, Write};

/// 出站写队列
#[derive(Debug, Default)]
pub struct WriteQueue {
    buffers: VecDeque<Bytes>,
    /// 队首缓冲区已发送的字节数
    cursor: usize,
    /// 所有缓冲区中尚未发送的字节总数
    pending: usize,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个缓冲区，空缓冲区被忽略
    pub fn push(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.pending += data.len();
        self.buffers.push_back(data);
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// 尚未发送的字节数
    pub fn pending_bytes(&self) -> usize {
        self.pending
    }

    /// 排队中的缓冲区个数
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// 队首缓冲区中尚未发送的部分
    pub fn front_chunk(&self) -> Option<&[u8]> {
        self.buffers.front().map(|front| &front[self.cursor..])
    }

    /// 记录已发送 `n` 个字节
    pub fn advance(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.buffers.front() else {
                break;
            };
            let remaining = front.len() - self.cursor;
            let step = n.min(remaining);
            self.cursor += step;
            self.pending -= step;
            n -= step;
            if self.cursor == front.len() {
                self.buffers.pop_front();
                self.cursor = 0;
            }
        }
    }

    /// 尽可能多地写入 `sink`，直到队列为空或写端阻塞
    ///
    /// 返回本次写出的字节数。写端返回 0 视为连接已不可写，
    /// 以 [`io::ErrorKind::WriteZero`] 报告。
    pub fn drain_into<W: Write>(&mut self, sink: &mut W) -> io::Result<usize> {
        let mut written = 0;
        while let Some(chunk) = self.front_chunk() {
            match sink.write(chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write returned zero bytes",
                    ));
                }
                Ok(n) => {
                    self.advance(n);
                    written += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// 丢弃所有未发送的数据
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.cursor = 0;
        self.pending = 0;
    }
}
