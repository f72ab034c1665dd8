//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use event_demux::ingress::envelope::{
    EVENT_TYPE_HEADER, EXPECTED_USER_AGENT, TIMESTAMP_HEADER, USER_AGENT_HEADER,
};
use event_demux::{Envelope, RawMessage};

/// One request received by a mock destination.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// A destination that records every request and answers with a fixed status.
pub struct MockDestination {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
}

impl MockDestination {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Poll until `count` requests arrived or the deadline passes.
    pub async fn wait_for(&self, count: usize) -> Vec<Received> {
        for _ in 0..100 {
            let received = self.received();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.received()
    }
}

/// Start a mock destination on an ephemeral port.
pub async fn start_mock_destination(status: u16) -> MockDestination {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        handle(socket, status, sink).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockDestination { addr, received }
}

async fn handle(mut socket: TcpStream, status: u16, sink: Arc<Mutex<Vec<Received>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let path = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body = buf[header_end..].to_vec();

    sink.lock().unwrap().push(Received { path, headers, body });

    let status_text = match status {
        200 => "200 OK",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status_text
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Gitee-style push payload for `org/repo`.
pub fn payload(org: &str, repo: &str) -> String {
    format!(
        r#"{{"ref":"refs/heads/master","repository":{{"namespace":"{org}","path":"{repo}","full_name":"{org}/{repo}"}}}}"#
    )
}

/// A valid envelope carrying `payload(org, repo)`.
pub fn envelope(org: &str, repo: &str, event: &str) -> Envelope {
    let message = RawMessage::new(payload(org, repo).into_bytes())
        .with_header(USER_AGENT_HEADER, EXPECTED_USER_AGENT)
        .with_header(EVENT_TYPE_HEADER, event)
        .with_header(TIMESTAMP_HEADER, "1700000000000");
    event_demux::ingress::validate(message).unwrap()
}
