//! Shared utilities for proxy integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use waypoint::http::parser::{parse_request_head, parse_response_head, request_framing, BodyFraming};
use waypoint::http::request::RequestHead;
use waypoint::http::response::ResponseHead;
use waypoint::proxy::{Forwarder, Upstream};
use waypoint::server::listener::serve;

pub const OK_JSON: &[u8] = b"HTTP/1.1 200 OK\r\nX-Test: 1\r\nContent-Length: 11\r\n\r\n{\"ok\":true}";

/// A request as the mock upstream saw it.
#[derive(Debug)]
pub struct Captured {
    pub head: RequestHead,
    pub body: Vec<u8>,
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(upstream: &str, prefix: &str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let url = url::Url::parse(upstream).unwrap();
    let forwarder = Arc::new(Forwarder::new(prefix, Upstream::from_url(&url).unwrap()));
    tokio::spawn(serve(listener, forwarder));

    addr
}

/// Start a mock upstream that records each request and answers with `response`.
pub async fn start_upstream(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let captured = read_request(&mut socket).await;
                let _ = tx.send(captured);
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Read one `Content-Length` framed request.
pub async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    loop {
        if let Ok((head, consumed)) = parse_request_head(&buf) {
            let length = match request_framing(&head).unwrap() {
                BodyFraming::Length(n) => n as usize,
                _ => 0,
            };
            while buf.len() < consumed + length {
                read_more(socket, &mut buf).await;
            }
            let body = buf[consumed..consumed + length].to_vec();
            return Captured { head, body };
        }
        read_more(socket, &mut buf).await;
    }
}

/// Read one response with a `Content-Length` body (or none).
pub async fn read_response(socket: &mut TcpStream) -> (ResponseHead, Vec<u8>) {
    let mut buf = Vec::new();
    loop {
        if let Ok((head, consumed)) = parse_response_head(&buf) {
            let length: usize = head
                .header("Content-Length")
                .map(|v| v.parse().unwrap())
                .unwrap_or(0);
            while buf.len() < consumed + length {
                read_more(socket, &mut buf).await;
            }
            return (head, buf[consumed..consumed + length].to_vec());
        }
        read_more(socket, &mut buf).await;
    }
}

/// Send raw bytes and read until the proxy closes the connection.
pub async fn roundtrip(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    response
}

async fn read_more(socket: &mut TcpStream, buf: &mut Vec<u8>) {
    let mut temp = [0u8; 1024];
    let n = socket.read(&mut temp).await.unwrap();
    assert!(n > 0, "peer closed early");
    buf.extend_from_slice(&temp[..n]);
}
