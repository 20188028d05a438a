//! Loopback HTTP/1.1 server for integration tests.
//!
//! Each accepted connection reads one request, replies with the scripted
//! status and body chunks, then closes. Bodies are close-delimited so chunk
//! boundaries reach the client as separate writes.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub chunks: Vec<Vec<u8>>,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.as_bytes().to_vec()],
        }
    }

    pub fn event_stream(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            chunks,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            chunks: Vec::new(),
        }
    }
}

pub struct TestServer {
    pub url: String,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl TestServer {
    /// Serve `replies` in order, one connection each.
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let handle = tokio::spawn(async move {
            let mut captured = Vec::new();
            for reply in replies {
                let (mut socket, _) = listener.accept().await.expect("accept");
                captured.push(read_request(&mut socket).await);

                let head = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
                    reply.status, reply.content_type
                );
                socket.write_all(head.as_bytes()).await.expect("write head");
                for chunk in &reply.chunks {
                    socket.write_all(chunk).await.expect("write chunk");
                    socket.flush().await.expect("flush");
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                let _ = socket.shutdown().await;
            }
            captured
        });

        Self {
            url: format!("http://{addr}"),
            handle,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Wait for every scripted reply to be served and return the requests.
    pub async fn requests(self) -> Vec<CapturedRequest> {
        self.handle.await.expect("server task")
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.expect("read");
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&tmp[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        if let httparse::Status::Complete(head_len) = req.parse(&buf).expect("valid request") {
            let headers: Vec<(String, String)> = req
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).to_string()))
                .collect();
            let content_length = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_len + content_length {
                return CapturedRequest {
                    method: req.method.unwrap_or_default().to_string(),
                    path: req.path.unwrap_or_default().to_string(),
                    headers,
                    body: buf[head_len..head_len + content_length].to_vec(),
                };
            }
        }
    }
}

/// An address nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}/")
}

pub fn content_delta(text: &str) -> Vec<u8> {
    let event = serde_json::json!({
        "type": "content-delta",
        "index": 0,
        "delta": { "message": { "content": { "text": text } } }
    });
    format!("data: {event}\n\n").into_bytes()
}
