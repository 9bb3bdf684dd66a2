//! Simplified server builder for common use cases
//!
//! Provides a high-level API for wiring a listener, a reactor and an accept
//! callback together with minimal boilerplate.

use crate::{Error, Result};
use deft_config::{ConfigError, ReactorConfig, ServerConfig};
use deft_network::{Acceptor, IoStream, Reactor};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::info;

type AcceptCallback = Box<dyn FnMut(IoStream)>;

/// Simplified server builder
///
/// Provides a fluent API for building servers with sensible defaults.
///
/// # Example
///
/// ```rust,no_run
/// use deft::Server;
///
/// fn main() -> deft::Result<()> {
///     Server::bind("127.0.0.1:8080")
///         .on_accept(|stream| {
///             let _ = stream.write("hello\r\n");
///         })
///         .run()
/// }
/// ```
pub struct ServerBuilder {
    /// Listener configuration
    config: ServerConfig,
    /// Reactor and buffer configuration
    reactor_config: ReactorConfig,
    /// Called once for every accepted connection
    on_accept: Option<AcceptCallback>,
}

impl ServerBuilder {
    /// Create a new server builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            reactor_config: ReactorConfig::default(),
            on_accept: None,
        }
    }

    /// Bind to a specific address
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind to (e.g., "127.0.0.1:8080" or "0.0.0.0:0")
    ///
    /// A missing or malformed port falls back to 8080.
    pub fn bind(addr: impl Into<String>) -> Self {
        let addr_str = addr.into();
        let (bind_address, port) = parse_addr(&addr_str);

        let config = ServerConfig { bind_address, port };

        Self {
            config,
            ..Self::new()
        }
    }

    /// Set custom listener configuration
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use deft::Server;
    /// use deft::deft_config::ServerConfig;
    ///
    /// let config = ServerConfig {
    ///     bind_address: "0.0.0.0".to_string(),
    ///     port: 9000,
    /// };
    ///
    /// let server = Server::new().config(config);
    /// ```
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set custom reactor and buffer configuration
    pub fn reactor_config(mut self, config: ReactorConfig) -> Self {
        self.reactor_config = config;
        self
    }

    /// Set the callback invoked for every accepted connection
    ///
    /// The callback runs on the reactor thread. It must not keep a strong
    /// [`Reactor`] handle alive; use [`Reactor::downgrade`] if one is needed.
    pub fn on_accept<F>(mut self, callback: F) -> Self
    where
        F: FnMut(IoStream) + 'static,
    {
        self.on_accept = Some(Box::new(callback));
        self
    }

    /// Validate configuration, create the reactor and start listening
    ///
    /// Fails if an accept callback was never set, if either configuration is
    /// invalid, if a reactor already exists on this thread, or if the address
    /// cannot be bound.
    pub fn build(self) -> Result<BoundServer> {
        self.config.validate()?;
        self.reactor_config.validate()?;

        let on_accept = self
            .on_accept
            .ok_or_else(|| ConfigError::Validation("未设置连接回调 on_accept".to_string()))?;
        let addr = resolve(&self.config.bind_addr())?;

        let reactor = Reactor::with_config(&self.reactor_config)?;
        let acceptor = Acceptor::bind(&reactor, addr, &self.reactor_config, on_accept)?;

        info!(local_addr = %acceptor.local_addr(), "Deft 服务器已启动");
        Ok(BoundServer { reactor, acceptor })
    }

    /// Build and run the server on the current thread
    ///
    /// Only returns on failure: the reactor loop has no timeout.
    pub fn run(self) -> Result<()> {
        self.build()?.run()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("reactor_config", &self.reactor_config)
            .field("on_accept", &self.on_accept.is_some())
            .finish()
    }
}

/// Type alias for convenience
pub type Server = ServerBuilder;

/// A server whose listener is bound and registered but not yet running
///
/// Useful when the caller needs the actual port (e.g. after binding port 0)
/// or wants to drive the reactor one cycle at a time.
#[derive(Debug)]
pub struct BoundServer {
    reactor: Reactor,
    acceptor: Acceptor,
}

impl BoundServer {
    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    /// The reactor driving this server
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// The listening acceptor
    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    /// Run a single wait-and-dispatch cycle
    pub fn poll_once(&self, timeout: Option<Duration>) -> Result<usize> {
        Ok(self.reactor.poll_once(timeout)?)
    }

    /// Run the reactor loop forever
    pub fn run(self) -> Result<()> {
        Ok(self.reactor.run()?)
    }
}

/// Parse address string into (host, port) tuple
///
/// # Arguments
///
/// * `addr` - Address string (e.g., "127.0.0.1:8080")
///
/// # Returns
///
/// A tuple of (host, port)
fn parse_addr(addr: &str) -> (String, u16) {
    if let Some((host, port)) = addr.rsplit_once(':') {
        let port = port.parse().unwrap_or(8080);
        (host.to_string(), port)
    } else {
        (addr.to_string(), 8080)
    }
}

/// Resolve "host:port" to the first socket address
fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Custom(format!("无法解析地址: {}", addr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addr_with_port() {
        let (host, port) = parse_addr("127.0.0.1:8080");
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_parse_addr_without_port() {
        let (host, port) = parse_addr("127.0.0.1");
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8080); // default port
    }

    #[test]
    fn test_parse_addr_bad_port() {
        let (host, port) = parse_addr("localhost:http");
        assert_eq!(host, "localhost");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_server_builder_creation() {
        let builder = ServerBuilder::new();
        assert_eq!(builder.config.port, 8080);
        assert!(builder.on_accept.is_none());
    }

    #[test]
    fn test_server_builder_bind() {
        let builder = ServerBuilder::bind("127.0.0.1:9000");
        assert_eq!(builder.config.bind_address, "127.0.0.1");
        assert_eq!(builder.config.port, 9000);
    }

    #[test]
    fn test_build_requires_on_accept() {
        let result = ServerBuilder::bind("127.0.0.1:0").build();
        assert!(matches!(result, Err(Error::Config(ConfigError::Validation(_)))));
    }

    #[test]
    fn test_build_rejects_invalid_reactor_config() {
        let result = ServerBuilder::bind("127.0.0.1:0")
            .reactor_config(ReactorConfig {
                read_chunk_size: 0,
                ..Default::default()
            })
            .on_accept(|_| {})
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_binds_ephemeral_port() {
        let server = ServerBuilder::bind("127.0.0.1:0").on_accept(|_| {}).build().unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.reactor().handler_count(), 1);
    }
}
