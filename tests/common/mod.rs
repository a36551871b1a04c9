//! Shared utilities for integration tests.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a TCP server that drops the first `failures` connections, then
/// answers every request with `reply`.
///
/// Returns the bound address and the number of connections accepted so far.
#[allow(dead_code)]
pub async fn start_flaky_server(failures: u32, reply: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        if seen < failures {
                            drop(socket);
                            return;
                        }
                        let mut buf = [0u8; 64];
                        let _ = socket.read(&mut buf).await;
                        let _ = socket.write_all(reply.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, accepted)
}

/// Every line of every `.log` file in `dir`.
#[allow(dead_code)]
pub fn read_log_lines(dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) == Some("log") {
            let content = fs::read_to_string(&path).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }
    }
    lines
}

/// Split a record into timestamp, level and body; `None` if malformed.
#[allow(dead_code)]
pub fn split_record(line: &str) -> Option<(&str, &str, &str)> {
    let (timestamp, rest) = line.split_once(' ')?;
    if !timestamp.ends_with('Z') || chrono::DateTime::parse_from_rfc3339(timestamp).is_err() {
        return None;
    }
    let rest = rest.strip_prefix('[')?;
    let (level, body) = rest.split_once("] ")?;
    Some((timestamp, level, body))
}

/// Start an HTTP/1.1 server that answers every request with `status` and an
/// empty body, after reading the full request head.
#[allow(dead_code)]
pub async fn start_status_server(status: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
