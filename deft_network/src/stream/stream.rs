//! 非阻塞连接流
//!
//! 每个接受的连接对应一个 [`IoStream`]。它独占套接字，持有入站分帧器、
//! 出站写队列和至多一个未完成的读取，并把 Reactor 的就绪通知转换成
//! 缓冲区变化和回调。
//!
//! 回调可以在回调内部再次调用 `read_until`/`write`。如果请求的帧已经
//! 缓冲好，`read_until` 会在返回前同步调用回调。在回调内部再次读取时
//! 不会递归：新的读取被登记，等当前回调返回后由同一个交付循环立即
//! 完成，因此连续缓冲的帧再多也不会加深调用栈。实现保证调用任何回调
//! 时都不持有内部状态的借用。
//!
//! 每轮可读就绪最多接收 `read_chunk_size` 字节。额度用完时重新登记
//! 兴趣集，让选择机制在下一轮再次报告剩余数据。

use crate::buffer::Tokenizer;
use crate::reactor::{EventHandler, Reactor, Readiness, WeakReactor};
use crate::stream::completion::{Completion, ReadResult};
use crate::stream::write_queue::WriteQueue;
use bytes::Bytes;
use deft_config::ReactorConfig;
use deft_core::{DeftError, ErrorContext, Result};
use mio::net::TcpStream;
use mio::{Interest, Token};
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// 创建流时分帧器使用的分隔符，第一次 `read_until` 会替换它
const DEFAULT_DELIMITER: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy)]
enum ReadTarget {
    /// 读到当前分隔符为止
    Until,
    /// 读恰好 n 个字节
    Exactly(usize),
}

struct PendingRead {
    target: ReadTarget,
    completion: Completion,
}

struct StreamState {
    /// `None` 表示已关闭
    socket: Option<TcpStream>,
    token: Token,
    peer: Option<SocketAddr>,
    tokenizer: Tokenizer,
    /// 长度即每轮接收额度
    scratch: Box<[u8]>,
    pending_read: Option<PendingRead>,
    write_queue: WriteQueue,
    /// 当前在 Reactor 中登记的兴趣集
    registered: Interest,
    /// 交付循环正在运行
    delivering: bool,
}

impl StreamState {
    /// 读兴趣始终保留；只有写队列非空时才需要写兴趣
    fn desired_interest(&self) -> Interest {
        if self.write_queue.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    fn is_satisfiable(&mut self, target: ReadTarget) -> bool {
        match target {
            ReadTarget::Until => self.tokenizer.has_next(),
            ReadTarget::Exactly(n) => self.tokenizer.size() >= n,
        }
    }

    /// 待处理读取已可满足时，取出它和对应的帧
    fn take_ready_read(&mut self) -> Option<(Completion, ReadResult)> {
        let target = self.pending_read.as_ref()?.target;
        if !self.is_satisfiable(target) {
            return None;
        }
        let pending = self.pending_read.take()?;
        let frame = match pending.target {
            ReadTarget::Until => self.tokenizer.next(),
            ReadTarget::Exactly(n) => self.tokenizer.slice(n),
        };
        Some((pending.completion, frame))
    }
}

/// 一轮接收的结果
struct Received {
    /// 需要关闭连接的故障
    fault: Option<DeftError>,
    /// 本轮额度已用完，套接字里可能还有数据
    saturated: bool,
}

/// 交付循环退出（包括回调 panic）时清除标记
struct DeliveryGuard<'a>(&'a RefCell<StreamState>);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            state.delivering = false;
        }
    }
}

/// 非阻塞连接流
///
/// 克隆只复制句柄，所有克隆共享同一个连接。
#[derive(Clone)]
pub struct IoStream {
    state: Rc<RefCell<StreamState>>,
    reactor: WeakReactor,
}

impl IoStream {
    /// 使用默认缓冲配置创建并注册到 Reactor
    pub fn new(reactor: &Reactor, socket: TcpStream) -> Result<Self> {
        Self::with_config(reactor, socket, &ReactorConfig::default())
    }

    /// 使用指定缓冲配置创建并注册到 Reactor，初始兴趣为可读
    pub fn with_config(reactor: &Reactor, mut socket: TcpStream, config: &ReactorConfig) -> Result<Self> {
        let tokenizer = Tokenizer::with_limit(
            config.initial_buffer_capacity,
            DEFAULT_DELIMITER,
            config.buffer_limit(),
        )?;
        let peer = socket.peer_addr().ok();

        let stream = IoStream {
            state: Rc::new(RefCell::new(StreamState {
                socket: None,
                token: Token(usize::MAX),
                peer,
                tokenizer,
                scratch: vec![0; config.read_chunk_size].into_boxed_slice(),
                pending_read: None,
                write_queue: WriteQueue::new(),
                registered: Interest::READABLE,
                delivering: false,
            })),
            reactor: reactor.downgrade(),
        };

        let token = reactor.add_handler(&mut socket, Rc::new(stream.clone()), Interest::READABLE)?;
        {
            let mut state = stream.state.borrow_mut();
            state.socket = Some(socket);
            state.token = token;
        }

        debug!(?token, ?peer, "连接已注册");
        Ok(stream)
    }

    /// 读到 `delimiter` 为止（帧包含分隔符）
    ///
    /// 分隔符帧已经缓冲时，`callback` 在本方法返回前被调用；如果本方法
    /// 是在本连接的回调内部调用的，则在那个回调返回后立即调用。否则：
    /// 连接已关闭返回 [`DeftError::Closed`]，已有未完成的读取返回
    /// [`DeftError::ReadPending`]，这两种情况都不会调用 `callback`；
    /// 成功登记后 `callback` 恰好被调用一次，连接关闭时以错误完成。
    pub fn read_until<F>(&self, delimiter: &[u8], callback: F) -> Result<()>
    where
        F: FnOnce(ReadResult) + 'static,
    {
        {
            let mut state = self.state.borrow_mut();
            if state.pending_read.is_some() {
                return Err(DeftError::ReadPending);
            }
            state.tokenizer.set_delimiter(delimiter)?;
        }
        self.arm(ReadTarget::Until, callback)
    }

    /// 读恰好 `n` 个字节，语义与 [`read_until`](Self::read_until) 相同
    pub fn read_bytes<F>(&self, n: usize, callback: F) -> Result<()>
    where
        F: FnOnce(ReadResult) + 'static,
    {
        if self.state.borrow().pending_read.is_some() {
            return Err(DeftError::ReadPending);
        }
        self.arm(ReadTarget::Exactly(n), callback)
    }

    /// 把数据排入写队列并请求写就绪
    ///
    /// 之前排队但未发完的数据不受影响，按顺序先发送。连接已关闭或
    /// Reactor 已销毁时返回 [`DeftError::Closed`]，数据不入队。
    pub fn write(&self, data: impl Into<Bytes>) -> Result<()> {
        if self.reactor.upgrade().is_none() {
            self.close_with(DeftError::reactor("Reactor 已销毁"));
            return Err(DeftError::Closed);
        }
        {
            let mut state = self.state.borrow_mut();
            if state.socket.is_none() {
                return Err(DeftError::Closed);
            }
            state.write_queue.push(data.into());
        }
        self.refresh_interest(false);
        Ok(())
    }

    /// 关闭连接，可重复调用
    ///
    /// 注销 Reactor 注册、关闭套接字、丢弃未发送的数据；未完成的读取
    /// 以 [`DeftError::StaleCallback`] 完成。
    pub fn close(&self) {
        self.close_with(DeftError::StaleCallback);
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().socket.is_none()
    }

    /// Reactor 分配的令牌
    pub fn token(&self) -> Token {
        self.state.borrow().token
    }

    /// 对端地址
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.state.borrow().peer
    }

    /// 入站缓冲中尚未被读取的字节数
    pub fn buffered_len(&self) -> usize {
        self.state.borrow().tokenizer.size()
    }

    /// 写队列中尚未发送的字节数
    pub fn pending_write_bytes(&self) -> usize {
        self.state.borrow().write_queue.pending_bytes()
    }

    /// 是否有未完成的读取
    pub fn has_pending_read(&self) -> bool {
        self.state.borrow().pending_read.is_some()
    }

    /// 登记读取；已可满足时交付
    fn arm<F>(&self, target: ReadTarget, callback: F) -> Result<()>
    where
        F: FnOnce(ReadResult) + 'static,
    {
        let ready = {
            let mut state = self.state.borrow_mut();
            let ready = state.is_satisfiable(target);
            if !ready && state.socket.is_none() {
                return Err(DeftError::Closed);
            }
            state.pending_read = Some(PendingRead {
                target,
                completion: Completion::new(callback),
            });
            ready
        };
        if ready {
            self.deliver_ready();
        }
        Ok(())
    }

    /// 依次完成所有已可满足的读取
    ///
    /// 回调内部登记的读取由外层循环接着完成，不递归。
    fn deliver_ready(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        let _guard = DeliveryGuard(&self.state);

        loop {
            let ready = self.state.borrow_mut().take_ready_read();
            let Some((completion, frame)) = ready else {
                break;
            };
            completion.complete(frame);
        }
    }

    fn close_with(&self, reason: DeftError) {
        let (mut socket, token, pending) = {
            let mut state = self.state.borrow_mut();
            let Some(socket) = state.socket.take() else {
                return;
            };
            state.write_queue.clear();
            (socket, state.token, state.pending_read.take())
        };

        if let Some(reactor) = self.reactor.upgrade() {
            if let Err(e) = reactor.remove_handler(&mut socket, token) {
                warn!(?token, error = %e, "注销连接失败");
            }
        }
        drop(socket);

        debug!(?token, reason = %reason, "连接已关闭");
        if let Some(pending) = pending {
            pending.completion.fail(reason);
        }
    }

    fn connection_fault(&self, error: DeftError) -> DeftError {
        let state = self.state.borrow();
        error.with_context(ErrorContext::connection(state.token.0, state.peer))
    }

    /// 接收最多一个额度的数据，直到套接字阻塞或额度用完
    fn receive(&self) -> Received {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(socket) = state.socket.as_mut() else {
            return Received { fault: None, saturated: false };
        };

        let budget = state.scratch.len();
        let mut received = 0;
        let fault = loop {
            if received == budget {
                break None;
            }
            match socket.read(&mut state.scratch[..budget - received]) {
                Ok(0) => break Some(DeftError::reset("对端关闭连接")),
                Ok(n) => {
                    received += n;
                    if let Err(e) = state.tokenizer.append(&state.scratch[..n]) {
                        break Some(e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break None,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Some(io_fault(e)),
            }
        };

        trace!(token = ?state.token, received, buffered = state.tokenizer.size(), "接收完成");
        Received {
            saturated: fault.is_none() && received == budget,
            fault,
        }
    }

    /// 返回本轮接收额度是否已用完
    fn handle_read(&self) -> bool {
        let Received { fault, saturated } = self.receive();

        self.deliver_ready();

        if let Some(fault) = fault {
            let fault = self.connection_fault(fault);
            self.close_with(fault);
        }
        saturated
    }

    fn handle_write(&self) {
        let result = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let Some(socket) = state.socket.as_mut() else {
                return;
            };
            state.write_queue.drain_into(socket)
        };

        match result {
            Ok(written) => trace!(token = ?self.token(), written, "发送完成"),
            Err(e) => {
                let fault = self.connection_fault(io_fault(e));
                self.close_with(fault);
            }
        }
    }

    /// 按写队列状态重新计算兴趣集，变化时更新注册
    ///
    /// `rearm` 为真时即使兴趣集不变也重新登记，让选择机制再次报告
    /// 仍然就绪的通道。
    fn refresh_interest(&self, rearm: bool) {
        let Some(reactor) = self.reactor.upgrade() else {
            self.close_with(DeftError::reactor("Reactor 已销毁"));
            return;
        };

        let result = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let desired = state.desired_interest();
            if desired == state.registered && !rearm {
                return;
            }
            let token = state.token;
            let Some(socket) = state.socket.as_mut() else {
                return;
            };
            let result = reactor.update_handler(socket, token, desired);
            if result.is_ok() {
                state.registered = desired;
            }
            result
        };

        if let Err(e) = result {
            self.close_with(e);
        }
    }
}

impl EventHandler for IoStream {
    fn handle_events(&self, readiness: Readiness) {
        let mut saturated = false;
        if readiness.is_readable() {
            saturated = self.handle_read();
        }
        // 读处理中可能已经关闭
        if self.is_closed() {
            return;
        }
        if readiness.is_writable() {
            self.handle_write();
        }
        if self.is_closed() {
            return;
        }
        self.refresh_interest(saturated);
    }

    fn shutdown(&self) {
        self.close_with(DeftError::StaleCallback);
    }
}

impl fmt::Debug for IoStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("IoStream")
            .field("token", &state.token)
            .field("peer", &state.peer)
            .field("closed", &state.socket.is_none())
            .field("buffered", &state.tokenizer.size())
            .field("pending_write", &state.write_queue.pending_bytes())
            .finish()
    }
}

fn io_fault(error: io::Error) -> DeftError {
    match error.kind() {
        io::ErrorKind::WriteZero => DeftError::reset("写入返回 0 字节"),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => DeftError::reset(error.to_string()),
        _ => DeftError::Io(error),
    }
}
