//! 服务器端到端测试
//!
//! 在测试线程上逐轮驱动 Reactor，客户端在另一个线程里阻塞读写。

use bytes::Bytes;
use deft::deft_network::IoStream;
use deft::{Error, Server};
use std::cell::RefCell;
use std::io::{BufRead, BufReader, Read, Write};
use std::rc::Rc;
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// 读一行并原样写回，然后继续读下一行
fn echo(stream: IoStream) {
    let next = stream.clone();
    let _ = stream.read_until(b"\n", move |result| {
        if let Ok(line) = result {
            if next.write(line).is_ok() {
                echo(next);
            }
        }
    });
}

#[test]
fn test_line_echo_round_trip() {
    let server = Server::bind("127.0.0.1:0").on_accept(echo).build().unwrap();
    let addr = server.local_addr();
    let (done_tx, done_rx) = mpsc::channel();

    let client = thread::spawn(move || {
        let mut socket = TcpStream::connect(addr).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut reader = BufReader::new(socket.try_clone().unwrap());

        let mut replies = Vec::new();
        for line in ["alpha\n", "beta\n", "gamma\n"] {
            socket.write_all(line.as_bytes()).unwrap();
            let mut reply = String::new();
            reader.read_line(&mut reply).unwrap();
            replies.push(reply);
        }
        done_tx.send(()).unwrap();
        replies
    });

    for _ in 0..1000 {
        if done_rx.try_recv().is_ok() {
            break;
        }
        server.poll_once(Some(Duration::from_millis(10))).unwrap();
    }

    let replies = client.join().unwrap();
    assert_eq!(replies, vec!["alpha\n", "beta\n", "gamma\n"]);
    assert_eq!(server.acceptor().accepted(), 1);
}

#[test]
fn test_greeting_written_on_accept() {
    let server = Server::bind("127.0.0.1:0")
        .on_accept(|stream| {
            stream.write(Bytes::from_static(b"welcome\r\n")).unwrap();
        })
        .build()
        .unwrap();
    let addr = server.local_addr();

    let client = thread::spawn(move || {
        let socket = TcpStream::connect(addr).unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut line = String::new();
        BufReader::new(socket).read_line(&mut line).unwrap();
        line
    });

    while !client.is_finished() {
        server.poll_once(Some(Duration::from_millis(10))).unwrap();
    }
    assert_eq!(client.join().unwrap(), "welcome\r\n");
}

#[test]
fn test_second_server_on_same_thread_fails() {
    let first = Server::bind("127.0.0.1:0").on_accept(|_| {}).build().unwrap();
    let second = Server::bind("127.0.0.1:0").on_accept(|_| {}).build();
    assert!(matches!(second, Err(Error::Core(_))));
    drop(first);
}

#[test]
fn test_dropping_server_closes_connections_and_fails_reads() {
    let results = Rc::new(RefCell::new(Vec::new()));
    let sink = results.clone();
    let server = Server::bind("127.0.0.1:0")
        .on_accept(move |stream| {
            // 回调捕获自身的流，和回显服务器的用法一致
            let next = stream.clone();
            let sink = sink.clone();
            stream
                .read_until(b"\n", move |result| {
                    sink.borrow_mut().push(result.map(|_| next.is_closed()));
                })
                .unwrap();
        })
        .build()
        .unwrap();

    let mut client = TcpStream::connect(server.local_addr()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    for _ in 0..500 {
        if server.acceptor().accepted() == 1 {
            break;
        }
        server.poll_once(Some(Duration::from_millis(10))).unwrap();
    }
    assert_eq!(server.acceptor().accepted(), 1);

    drop(server);

    let mut buf = [0u8; 1];
    assert_eq!(client.read(&mut buf).unwrap(), 0);
    let results = results.borrow();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(deft::deft_core::DeftError::StaleCallback)));
}
