//! 行回显服务器示例
//!
//! 读取以 "\r\n" 结尾的帧，原样写回，再等待下一帧。
//!
//! 运行：
//! ```bash
//! cargo run --example line_echo
//! ```
//!
//! 另开终端用 `nc -C 127.0.0.1 8080` 连接并输入几行。

use deft::deft_network::IoStream;
use deft::Server;

fn serve(stream: IoStream) {
    let next = stream.clone();
    let armed = stream.read_until(b"\r\n", move |result| match result {
        Ok(frame) => {
            println!("收到 {} 字节: {:?}", frame.len(), String::from_utf8_lossy(&frame));
            if next.write(frame).is_ok() {
                serve(next);
            }
        }
        Err(e) => println!("连接结束: {}", e),
    });

    if let Err(e) = armed {
        println!("无法读取: {}", e);
    }
}

fn main() -> deft::Result<()> {
    println!("Deft 行回显服务器");
    println!("版本: {}", deft::VERSION);

    Server::bind("127.0.0.1:8080")
        .on_accept(|stream| {
            println!("新连接: {:?}", stream.peer_addr());
            serve(stream);
        })
        .run()
}
