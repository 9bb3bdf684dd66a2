//! 环境变量覆盖示例
//!
//! 演示如何使用环境变量覆盖服务器和 Reactor 配置

use deft_config::{ReactorConfig, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Deft 环境变量覆盖示例 ===\n");

    // 示例 1: 设置环境变量
    println!("1. 设置环境变量:");
    unsafe {
        std::env::set_var("DEFT_PORT", "9999");
        std::env::set_var("DEFT_BIND_ADDRESS", "127.0.0.1");
        std::env::set_var("DEFT_READ_CHUNK_SIZE", "4096");
    }
    println!("   DEFT_PORT=9999");
    println!("   DEFT_BIND_ADDRESS=127.0.0.1");
    println!("   DEFT_READ_CHUNK_SIZE=4096");
    println!();

    // 示例 2: 加载默认配置并应用环境变量覆盖
    println!("2. 加载默认配置并应用环境变量覆盖:");
    let server = ServerConfig::default().load_with_env_override()?;
    let reactor = ReactorConfig::default().load_with_env_override()?;

    println!("   ✓ 配置加载成功:");
    println!("     - 地址: {}", server.bind_addr());
    println!("     - 接收块大小: {}", reactor.read_chunk_size);
    println!("     - 缓冲区上限: {}", reactor.buffer_limit());
    println!();

    // 示例 3: 验证配置
    println!("3. 验证配置:");
    match server.validate().and_then(|_| reactor.validate()) {
        Ok(_) => println!("   ✓ 配置有效"),
        Err(e) => println!("   ✗ 配置无效: {}", e),
    }
    println!();

    println!("{}", server.summary());

    unsafe {
        std::env::remove_var("DEFT_PORT");
        std::env::remove_var("DEFT_BIND_ADDRESS");
        std::env::remove_var("DEFT_READ_CHUNK_SIZE");
    }

    Ok(())
}
