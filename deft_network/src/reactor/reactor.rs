//! 单线程 Reactor
//!
//! 持有操作系统的就绪选择机制（mio `Poll`），把每个注册通道映射到
//! 一个处理器和一个兴趣集，并在同一线程上循环“等待 → 分发”。
//!
//! Reactor 是显式传递的值而不是全局单例，但每个线程同一时间只允许
//! 存在一个。`Reactor` 基于 `Rc`，不能被发送到其他线程，因此所有处理器
//! 和回调都在运行 Reactor 的线程上执行，不需要任何锁。
//!
//! 同一轮中多个就绪通道的分发顺序由选择机制决定，不作保证。

use crate::reactor::handler::{EventHandler, Readiness};
use deft_config::ReactorConfig;
use deft_core::{DeftError, Result};
use mio::event::Source;
use mio::{Events, Interest, Poll, Registry, Token};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, error, trace};

thread_local! {
    static REACTOR_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

struct Inner {
    poll: RefCell<Poll>,
    /// `Poll` 注册表的克隆，分发期间处理器通过它改变注册
    registry: Registry,
    events: RefCell<Events>,
    handlers: RefCell<HashMap<Token, Rc<dyn EventHandler>>>,
    next_token: Cell<usize>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // 处理器可能通过回调捕获自身形成引用环，只释放分发条目不足以关闭连接
        let handlers = std::mem::take(self.handlers.get_mut());
        if !handlers.is_empty() {
            debug!(count = handlers.len(), "Reactor 销毁，关闭剩余处理器");
        }
        for (_, handler) in handlers {
            handler.shutdown();
        }
        REACTOR_ACTIVE.with(|active| active.set(false));
    }
}

/// 单线程 Reactor 句柄
///
/// 克隆只复制句柄。注册表对处理器持有的是分发条目：处理器注销后
/// 条目随之释放，Reactor 不决定连接的生命周期。
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<Inner>,
}

/// 不延长 Reactor 生命周期的弱句柄
///
/// 连接和接受器持有弱句柄，避免“Reactor → 处理器 → Reactor”的引用环。
#[derive(Clone)]
pub struct WeakReactor {
    inner: Weak<Inner>,
}

impl Reactor {
    /// 使用默认配置创建
    pub fn new() -> Result<Self> {
        Self::with_config(&ReactorConfig::default())
    }

    /// 使用指定配置创建
    ///
    /// 当前线程已有活动的 Reactor 时返回 [`DeftError::Reactor`]。
    pub fn with_config(config: &ReactorConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DeftError::config(e.to_string()))?;

        if REACTOR_ACTIVE.with(|active| active.replace(true)) {
            return Err(DeftError::reactor("当前线程已有活动的 Reactor"));
        }

        let opened = Poll::new().and_then(|poll| {
            let registry = poll.registry().try_clone()?;
            Ok((poll, registry))
        });
        let (poll, registry) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                REACTOR_ACTIVE.with(|active| active.set(false));
                return Err(DeftError::reactor(format!("打开选择器失败: {}", e)));
            }
        };

        debug!(event_capacity = config.event_capacity, "Reactor 已创建");

        Ok(Self {
            inner: Rc::new(Inner {
                poll: RefCell::new(poll),
                registry,
                events: RefCell::new(Events::with_capacity(config.event_capacity)),
                handlers: RefCell::new(HashMap::new()),
                next_token: Cell::new(0),
            }),
        })
    }

    /// 注册通道及其处理器，返回分配的令牌
    ///
    /// 每次注册都分配新令牌，注销后再次注册同一通道视为新的注册。
    pub fn add_handler<S>(
        &self,
        source: &mut S,
        handler: Rc<dyn EventHandler>,
        interest: Interest,
    ) -> Result<Token>
    where
        S: Source + ?Sized,
    {
        let token = Token(self.inner.next_token.get());
        self.inner
            .registry
            .register(source, token, interest)
            .map_err(|e| DeftError::reactor(format!("注册通道失败: {}", e)))?;
        self.inner.next_token.set(token.0 + 1);
        self.inner.handlers.borrow_mut().insert(token, handler);

        debug!(?token, ?interest, "注册处理器");
        Ok(token)
    }

    /// 替换已注册通道的兴趣集
    pub fn update_handler<S>(&self, source: &mut S, token: Token, interest: Interest) -> Result<()>
    where
        S: Source + ?Sized,
    {
        if !self.is_registered(token) {
            return Err(DeftError::reactor(format!("令牌 {:?} 未注册", token)));
        }
        self.inner
            .registry
            .reregister(source, token, interest)
            .map_err(|e| DeftError::reactor(format!("更新兴趣集失败: {}", e)))?;

        trace!(?token, ?interest, "更新兴趣集");
        Ok(())
    }

    /// 注销通道，对已注销的令牌是空操作
    pub fn remove_handler<S>(&self, source: &mut S, token: Token) -> Result<()>
    where
        S: Source + ?Sized,
    {
        // 先结束借用再释放处理器：处理器的析构可能再次访问 Reactor
        let removed = self.inner.handlers.borrow_mut().remove(&token);
        if removed.is_none() {
            return Ok(());
        }

        debug!(?token, "注销处理器");
        self.inner
            .registry
            .deregister(source)
            .map_err(|e| DeftError::reactor(format!("注销通道失败: {}", e)))
    }

    /// 令牌当前是否已注册
    pub fn is_registered(&self, token: Token) -> bool {
        self.inner.handlers.borrow().contains_key(&token)
    }

    /// 已注册的处理器数量
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// 获取弱句柄
    pub fn downgrade(&self) -> WeakReactor {
        WeakReactor {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// 执行一轮“等待 → 分发”
    ///
    /// `timeout` 为 `None` 时一直阻塞到至少一个通道就绪。每个就绪通道
    /// 在本轮中只分发一次；分发前才查找处理器，因此本轮中已被注销的
    /// 通道会被跳过。返回本轮就绪的通道数。
    ///
    /// 只有选择机制本身的失败才会返回错误，这种错误对 Reactor 是致命的。
    pub fn poll_once(&self, timeout: Option<Duration>) -> Result<usize> {
        let ready = {
            let mut poll = self.inner.poll.borrow_mut();
            let mut events = self.inner.events.borrow_mut();

            match poll.poll(&mut events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
                Err(e) => {
                    error!(error = %e, "等待就绪事件失败");
                    return Err(DeftError::reactor(format!("等待就绪事件失败: {}", e)));
                }
            }

            let mut ready: Vec<(Token, Readiness)> = Vec::new();
            let mut index: HashMap<Token, usize> = HashMap::new();
            for event in events.iter() {
                let readiness = Readiness::from_event(event);
                match index.get(&event.token()) {
                    Some(&slot) => ready[slot].1 = ready[slot].1.merge(readiness),
                    None => {
                        index.insert(event.token(), ready.len());
                        ready.push((event.token(), readiness));
                    }
                }
            }
            ready
        };

        trace!(count = ready.len(), "就绪通道");

        for (token, readiness) in &ready {
            let handler = self.inner.handlers.borrow().get(token).cloned();
            match handler {
                Some(handler) => handler.handle_events(*readiness),
                None => trace!(?token, "通道已注销，跳过"),
            }
        }

        Ok(ready.len())
    }

    /// 在当前线程上无限循环地等待并分发
    ///
    /// 没有超时。只有选择机制失败时返回错误。
    pub fn run(&self) -> Result<()> {
        debug!("Reactor 开始运行");
        loop {
            self.poll_once(None)?;
        }
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl WeakReactor {
    /// 升级为强句柄，Reactor 已销毁时返回 `None`
    pub fn upgrade(&self) -> Option<Reactor> {
        self.inner.upgrade().map(|inner| Reactor { inner })
    }
}

impl fmt::Debug for WeakReactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakReactor")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::{TcpListener, TcpStream};

    struct Recorder {
        seen: RefCell<Vec<Readiness>>,
        shutdowns: Cell<usize>,
    }

    impl EventHandler for Recorder {
        fn handle_events(&self, readiness: Readiness) {
            self.seen.borrow_mut().push(readiness);
        }

        fn shutdown(&self) {
            self.shutdowns.set(self.shutdowns.get() + 1);
        }
    }

    fn recorder() -> Rc<Recorder> {
        Rc::new(Recorder {
            seen: RefCell::new(Vec::new()),
            shutdowns: Cell::new(0),
        })
    }

    #[test]
    fn test_one_reactor_per_thread() {
        let reactor = Reactor::new().unwrap();
        assert!(matches!(Reactor::new(), Err(DeftError::Reactor(_))));
        drop(reactor);
        assert!(Reactor::new().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReactorConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(Reactor::with_config(&config), Err(DeftError::Config(_))));
        // 配置错误不占用线程内的 Reactor 名额
        assert!(Reactor::new().is_ok());
    }

    #[test]
    fn test_register_update_remove() {
        let reactor = Reactor::new().unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let token = reactor
            .add_handler(&mut listener, recorder(), Interest::READABLE)
            .unwrap();
        assert!(reactor.is_registered(token));
        assert_eq!(reactor.handler_count(), 1);

        reactor
            .update_handler(&mut listener, token, Interest::READABLE)
            .unwrap();

        reactor.remove_handler(&mut listener, token).unwrap();
        assert!(!reactor.is_registered(token));
        // 重复注销是空操作
        reactor.remove_handler(&mut listener, token).unwrap();

        // 再次注册是新的注册
        let again = reactor
            .add_handler(&mut listener, recorder(), Interest::READABLE)
            .unwrap();
        assert_ne!(again, token);
    }

    #[test]
    fn test_update_unknown_token_fails() {
        let reactor = Reactor::new().unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let result = reactor.update_handler(&mut listener, Token(42), Interest::READABLE);
        assert!(matches!(result, Err(DeftError::Reactor(_))));
    }

    #[test]
    fn test_write_interest_reports_writable() {
        let reactor = Reactor::new().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (_server_side, _) = listener.accept().unwrap();

        let handler = recorder();
        let token = reactor
            .add_handler(&mut client, handler.clone(), Interest::READABLE)
            .unwrap();
        reactor
            .update_handler(&mut client, token, Interest::READABLE | Interest::WRITABLE)
            .unwrap();

        for _ in 0..50 {
            reactor.poll_once(Some(Duration::from_millis(20))).unwrap();
            if handler.seen.borrow().iter().any(|r| r.is_writable()) {
                break;
            }
        }
        assert!(handler.seen.borrow().iter().any(|r| r.is_writable()));
    }

    #[test]
    fn test_drop_shuts_down_registered_handlers() {
        let reactor = Reactor::new().unwrap();
        let mut kept = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut removed = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let live = recorder();
        let gone = recorder();
        reactor.add_handler(&mut kept, live.clone(), Interest::READABLE).unwrap();
        let token = reactor.add_handler(&mut removed, gone.clone(), Interest::READABLE).unwrap();
        reactor.remove_handler(&mut removed, token).unwrap();

        drop(reactor);
        assert_eq!(live.shutdowns.get(), 1);
        assert_eq!(gone.shutdowns.get(), 0);
        assert_eq!(Rc::strong_count(&live), 1);
    }

    #[test]
    fn test_reactor_per_thread_is_independent() {
        let _here = Reactor::new().unwrap();
        let elsewhere = std::thread::spawn(|| Reactor::new().is_ok()).join().unwrap();
        assert!(elsewhere);
    }

    #[test]
    fn test_weak_handle() {
        let reactor = Reactor::new().unwrap();
        let weak = reactor.downgrade();
        assert!(weak.upgrade().is_some());
        drop(reactor);
        assert!(weak.upgrade().is_none());
    }
}
