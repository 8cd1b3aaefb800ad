//! Fixture HTTP server for exercising download sessions.
//!
//! Implemented over raw sockets so tests can shape behavior a real HTTP
//! framework will not produce: close-delimited bodies, a response that stalls
//! after a few body bytes, and a malformed status line.
//!
//! Routes:
//! - `/data/<n>` — 200 with `n` bytes of `A`, then the connection closes.
//! - `/stall` — 200 header plus 16 body bytes, then the connection is held
//!   open without further data.
//! - `/garbage` — a response line that is not HTTP.
//! - `/redirect` — 301 with a `Location` header and an empty body.
//! - `/error` — 500 with an empty body.
//! - anything else — 404 with an empty body.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_STALL: &str = "/stall";
pub const PATH_GARBAGE: &str = "/garbage";
pub const PATH_REDIRECT: &str = "/redirect";
pub const PATH_ERROR: &str = "/error";

const STALL_PREFIX_LEN: usize = 16;
const MAX_REQUEST_LEN: usize = 16 * 1024;

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_on("127.0.0.1:0".parse().expect("literal addr")).await
    }

    pub async fn start_on(bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        tokio::spawn(handle_connection(stream));
                    }
                }
            }
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

async fn handle_connection(mut stream: TcpStream) {
    let Some(path) = read_request_path(&mut stream).await else {
        return;
    };
    let _ = respond(&mut stream, &path).await;
}

async fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        if buf.len() > MAX_REQUEST_LEN {
            return None;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&buf);
    let mut tokens = text.split_whitespace();
    let _method = tokens.next()?;
    tokens.next().map(str::to_string)
}

async fn respond(stream: &mut TcpStream, path: &str) -> std::io::Result<()> {
    if let Some(rest) = path.strip_prefix("/data/") {
        let len: usize = rest.parse().unwrap_or(0);
        let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n");
        stream.write_all(header.as_bytes()).await?;

        let block = vec![b'A'; 64 * 1024];
        let mut left = len;
        while left > 0 {
            let take = left.min(block.len());
            stream.write_all(&block[..take]).await?;
            left -= take;
        }
        stream.shutdown().await
    } else if path == PATH_STALL {
        let header = "HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\n";
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(&[b'A'; STALL_PREFIX_LEN]).await?;

        // Hold the connection open; the peer is expected to give up first.
        sleep(Duration::from_secs(3600)).await;
        Ok(())
    } else if path == PATH_GARBAGE {
        stream.write_all(b"BOGUS 200 OK\r\n\r\n").await
    } else if path == PATH_REDIRECT {
        stream
            .write_all(
                b"HTTP/1.1 301 Moved Permanently\r\nLocation: /data/0\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )
            .await
    } else if path == PATH_ERROR {
        stream
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )
            .await
    } else {
        stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await
    }
}
