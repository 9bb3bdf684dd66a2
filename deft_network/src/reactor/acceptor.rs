//! 连接接受器
//!
//! 把监听套接字注册到 Reactor，可读时接受所有排队的连接，
//! 为每个连接创建 [`IoStream`] 并交给用户回调。

use crate::reactor::handler::{EventHandler, Readiness};
use crate::reactor::reactor::{Reactor, WeakReactor};
use crate::stream::IoStream;
use deft_config::ReactorConfig;
use deft_core::{DeftError, Result};
use mio::net::TcpListener;
use mio::{Interest, Token};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use tracing::{debug, info, warn};

struct AcceptorInner {
    /// `None` 表示已关闭
    listener: RefCell<Option<TcpListener>>,
    token: Cell<Token>,
    local_addr: SocketAddr,
    reactor: WeakReactor,
    config: ReactorConfig,
    on_accept: RefCell<Box<dyn FnMut(IoStream)>>,
    accepted: Cell<u64>,
}

/// 连接接受器
///
/// 回调中不要持有 `Reactor` 的强句柄，否则会形成引用环；
/// 需要时通过 [`Reactor::downgrade`] 获取弱句柄。
pub struct Acceptor {
    inner: Rc<AcceptorInner>,
}

impl Acceptor {
    /// 绑定地址并注册到 Reactor
    ///
    /// 端口为 0 时由系统分配，用 [`local_addr`](Self::local_addr) 查询。
    pub fn bind<F>(reactor: &Reactor, addr: SocketAddr, config: &ReactorConfig, on_accept: F) -> Result<Self>
    where
        F: FnMut(IoStream) + 'static,
    {
        let mut listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;

        let inner = Rc::new(AcceptorInner {
            listener: RefCell::new(None),
            token: Cell::new(Token(usize::MAX)),
            local_addr,
            reactor: reactor.downgrade(),
            config: config.clone(),
            on_accept: RefCell::new(Box::new(on_accept)),
            accepted: Cell::new(0),
        });

        let token = reactor.add_handler(&mut listener, inner.clone(), Interest::READABLE)?;
        inner.token.set(token);
        *inner.listener.borrow_mut() = Some(listener);

        info!(%local_addr, "开始接受连接");
        Ok(Self { inner })
    }

    /// 实际监听地址
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// 已接受的连接数
    pub fn accepted(&self) -> u64 {
        self.inner.accepted.get()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.listener.borrow().is_none()
    }

    /// 停止接受新连接，已接受的连接不受影响
    pub fn close(&self) -> Result<()> {
        let Some(mut listener) = self.inner.listener.borrow_mut().take() else {
            return Ok(());
        };
        debug!(local_addr = %self.inner.local_addr, "停止接受连接");
        match self.inner.reactor.upgrade() {
            Some(reactor) => reactor.remove_handler(&mut listener, self.inner.token.get()),
            None => Ok(()),
        }
    }
}

impl AcceptorInner {
    fn admit(&self, reactor: &Reactor, socket: mio::net::TcpStream, peer: SocketAddr) {
        match IoStream::with_config(reactor, socket, &self.config) {
            Ok(stream) => {
                self.accepted.set(self.accepted.get() + 1);
                debug!(%peer, token = ?stream.token(), "接受新连接");
                (self.on_accept.borrow_mut())(stream);
            }
            Err(e) => warn!(%peer, error = %e, "注册新连接失败"),
        }
    }
}

impl EventHandler for AcceptorInner {
    fn handle_events(&self, readiness: Readiness) {
        if !readiness.is_readable() {
            return;
        }
        let Some(reactor) = self.reactor.upgrade() else {
            return;
        };

        loop {
            let accepted = {
                let listener = self.listener.borrow();
                let Some(listener) = listener.as_ref() else {
                    return;
                };
                listener.accept()
            };

            match accepted {
                Ok((socket, peer)) => self.admit(&reactor, socket, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // 单个连接的接受失败不影响监听
                    warn!(error = %DeftError::from(e), "接受连接失败");
                    break;
                }
            }
        }
    }

    fn shutdown(&self) {
        if self.listener.borrow_mut().take().is_some() {
            debug!(local_addr = %self.local_addr, "Reactor 销毁，停止接受连接");
        }
    }
}

impl fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("local_addr", &self.inner.local_addr)
            .field("accepted", &self.inner.accepted.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}
