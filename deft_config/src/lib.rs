//! 配置管理系统
//!
//! 提供服务器监听配置和 Reactor 缓冲配置，支持 TOML 文件和环境变量覆盖。

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析配置文件失败: {0}")]
    Parse(String),

    /// 验证错误
    #[error("配置验证失败: {0}")]
    Validation(String),

    /// 环境变量错误
    #[error("环境变量解析失败: {0}")]
    EnvVar(String),
}

/// 配置 Result 类型
pub type Result<T> = std::result::Result<T, ConfigError>;

/// 服务器配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Reactor 与连接缓冲配置
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReactorConfig {
    /// 单次等待最多取回的就绪事件数
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// 每次非阻塞接收的块大小（字节）
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// 每个连接入站缓冲区的初始容量（字节）
    #[serde(default = "default_initial_buffer_capacity")]
    pub initial_buffer_capacity: usize,

    /// 入站缓冲区容量上限（None 表示平台最大可寻址大小）
    #[serde(default)]
    pub max_buffer_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            read_chunk_size: default_read_chunk_size(),
            initial_buffer_capacity: default_initial_buffer_capacity(),
            max_buffer_size: None,
        }
    }
}

fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Parse(format!("读取配置文件失败: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(format!("解析配置文件失败: {}", e)))
}

fn env_number<T: std::str::FromStr>(name: &str, expected: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVar(format!("{} 必须是有效的 {} 数字", name, expected))),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_toml(path)
    }

    /// 从环境变量加载配置并覆盖
    ///
    /// 支持的环境变量：
    /// - DEFT_BIND_ADDRESS: 绑定地址
    /// - DEFT_PORT: 端口
    pub fn load_with_env_override(mut self) -> Result<Self> {
        if let Ok(addr) = std::env::var("DEFT_BIND_ADDRESS") {
            self.bind_address = addr;
        }

        if let Some(port) = env_number("DEFT_PORT", "u16")? {
            self.port = port;
        }

        Ok(self)
    }

    /// 从文件加载并应用环境变量覆盖
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(path)?.load_with_env_override()
    }

    /// 验证配置是否有效
    ///
    /// 端口 0 表示由操作系统分配，允许使用。
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::Validation("绑定地址不能为空".to_string()));
        }

        Ok(())
    }

    /// 获取完整的绑定地址字符串
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// 获取配置摘要信息
    pub fn summary(&self) -> String {
        format!("Deft 服务器配置:\n  地址: {}", self.bind_addr())
    }
}

impl ReactorConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_toml(path)
    }

    /// 从环境变量加载配置并覆盖
    ///
    /// 支持的环境变量：
    /// - DEFT_EVENT_CAPACITY: 单次等待的事件容量
    /// - DEFT_READ_CHUNK_SIZE: 接收块大小
    /// - DEFT_MAX_BUFFER_SIZE: 入站缓冲区上限
    pub fn load_with_env_override(mut self) -> Result<Self> {
        if let Some(capacity) = env_number("DEFT_EVENT_CAPACITY", "usize")? {
            self.event_capacity = capacity;
        }

        if let Some(chunk) = env_number("DEFT_READ_CHUNK_SIZE", "usize")? {
            self.read_chunk_size = chunk;
        }

        if let Some(limit) = env_number("DEFT_MAX_BUFFER_SIZE", "usize")? {
            self.max_buffer_size = Some(limit);
        }

        Ok(self)
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Validation("事件容量不能为 0".to_string()));
        }

        if self.read_chunk_size == 0 {
            return Err(ConfigError::Validation("接收块大小不能为 0".to_string()));
        }

        if let Some(limit) = self.max_buffer_size {
            if limit < self.initial_buffer_capacity {
                return Err(ConfigError::Validation(format!(
                    "缓冲区上限 {} 小于初始容量 {}",
                    limit, self.initial_buffer_capacity
                )));
            }
        }

        Ok(())
    }

    /// 入站缓冲区的实际容量上限
    pub fn buffer_limit(&self) -> usize {
        self.max_buffer_size.unwrap_or(isize::MAX as usize)
    }
}

// 默认值函数
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_event_capacity() -> usize {
    1024
}

fn default_read_chunk_size() -> usize {
    1500
}

fn default_initial_buffer_capacity() -> usize {
    1500
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 9000,
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_empty_address() {
        let config = ServerConfig {
            bind_address: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reactor_defaults() {
        let config = ReactorConfig::default();
        assert_eq!(config.read_chunk_size, 1500);
        assert_eq!(config.initial_buffer_capacity, 1500);
        assert_eq!(config.buffer_limit(), isize::MAX as usize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reactor_validate_zero_chunk() {
        let config = ReactorConfig {
            read_chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reactor_validate_limit_below_initial() {
        let config = ReactorConfig {
            initial_buffer_capacity: 4096,
            max_buffer_size: Some(1024),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_port() {
        unsafe { std::env::set_var("DEFT_PORT", "9999") };
        let config = ServerConfig::default()
            .load_with_env_override()
            .unwrap();
        assert_eq!(config.port, 9999);
        unsafe { std::env::remove_var("DEFT_PORT") };
    }

    #[test]
    fn test_env_override_invalid_chunk_size() {
        unsafe { std::env::set_var("DEFT_READ_CHUNK_SIZE", "lots") };
        let result = ReactorConfig::default().load_with_env_override();
        assert!(matches!(result, Err(ConfigError::EnvVar(_))));
        unsafe { std::env::remove_var("DEFT_READ_CHUNK_SIZE") };
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "read_chunk_size = 4096\nmax_buffer_size = 65536").unwrap();

        let config = ReactorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.read_chunk_size, 4096);
        assert_eq!(config.max_buffer_size, Some(65536));
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_from_file_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_summary() {
        let config = ServerConfig::default();
        let summary = config.summary();
        assert!(summary.contains("0.0.0.0:8080"));
        assert!(summary.contains("Deft 服务器配置"));
    }
}
