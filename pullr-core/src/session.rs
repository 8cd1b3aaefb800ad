use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut as _, BytesMut};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpStream, lookup_host};
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, Sleep};
use url::Url;

use crate::config::Target;
use crate::kind::ErrorKind;

/// Body bytes consumed per streaming read.
pub const RECV_BLOCK_SIZE: usize = 10 * 1024;

/// Body bytes per throughput sample.
pub const STATS_WINDOW_SIZE: u64 = 1024 * 1024;

/// Size of the payload-latency probe read right after the header.
pub const FIRST_CHUNK_LEN: usize = 16;

pub type SessionId = u64;

/// Lifecycle events emitted by a session, in state-machine order. Durations
/// are milliseconds since the previous checkpoint. Every session ends with
/// exactly one of `Finished` or `Failed`, unless it is disconnected first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Resolved { ms: i32 },
    Connected { ms: i32 },
    RecvHeader { ms: i32 },
    FirstChunk { ms: i32 },
    Content { bytes: u64, ms: i32 },
    TotalBytes { total: u64 },
    Finished,
    Failed(ErrorKind),
}

pub type EventSender = UnboundedSender<(SessionId, SessionEvent)>;

/// Cancellation handle for one session. `disconnect` stops the session at its
/// next suspension point, dropping the socket and the watchdog; nothing is
/// emitted afterwards. Idempotent.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    cancel: Arc<Notify>,
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnect(&self) {
        self.cancel.notify_one();
    }

    async fn cancelled(&self) {
        self.cancel.notified().await;
    }
}

#[derive(Debug, Clone)]
enum HostKind {
    Ip(IpAddr),
    Name(String),
}

enum BlockRead {
    Full,
    Eof,
}

enum Flow {
    Continue,
    Eof,
}

/// One HTTP GET download: resolve, connect, request, header, 16-byte first
/// chunk, then 10 KiB block streaming until the observer disconnects it or
/// the stream ends.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    host: HostKind,
    port: u16,
    request: Vec<u8>,
    timeout: Duration,
    events: EventSender,

    content_bytes: u64,
    stats_bytes: u64,
    checkpoint: Instant,
}

impl Session {
    /// Start a session for `target`. I/O begins immediately on the runtime;
    /// events are delivered through `events` tagged with `id`.
    pub fn spawn(
        id: SessionId,
        target: &Target,
        timeout: Duration,
        events: EventSender,
        handle: SessionHandle,
    ) {
        let session = Session::new(id, target.url(), timeout, events);
        tokio::spawn(session.run(handle));
    }

    fn new(id: SessionId, url: &Url, timeout: Duration, events: EventSender) -> Self {
        let host = match url.host() {
            Some(url::Host::Ipv4(ip)) => HostKind::Ip(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => HostKind::Ip(IpAddr::V6(ip)),
            Some(url::Host::Domain(name)) => HostKind::Name(name.to_string()),
            None => HostKind::Name(String::new()),
        };

        Self {
            id,
            host,
            port: url.port().unwrap_or(80),
            request: build_request(url).into_bytes(),
            timeout,
            events,
            content_bytes: 0,
            stats_bytes: 0,
            checkpoint: Instant::now(),
        }
    }

    async fn run(mut self, handle: SessionHandle) {
        tokio::select! {
            _ = handle.cancelled() => {}
            () = self.drive() => {}
        }
    }

    async fn drive(&mut self) {
        match self.download().await {
            Ok(()) => self.emit(SessionEvent::Finished),
            Err(kind) => self.emit(SessionEvent::Failed(kind)),
        }
    }

    async fn download(&mut self) -> Result<(), ErrorKind> {
        let mut stream = self.connect_phase().await?;

        if stream.write_all(&self.request).await.is_err() {
            return Err(ErrorKind::Request);
        }
        self.checkpoint = Instant::now();

        // The watchdog runs from the moment the request is out; every
        // subsequent read races against it.
        let mut watchdog = Watchdog::arm(self.timeout, self.content_bytes);
        let mut buf = BytesMut::with_capacity(RECV_BLOCK_SIZE);

        self.header_phase(&mut stream, &mut watchdog, &mut buf).await?;

        match self
            .first_chunk_phase(&mut stream, &mut watchdog, &mut buf)
            .await?
        {
            Flow::Eof => Ok(()),
            Flow::Continue => {
                self.streaming_phase(&mut stream, &mut watchdog, &mut buf)
                    .await
            }
        }
    }

    async fn connect_phase(&mut self) -> Result<TcpStream, ErrorKind> {
        self.checkpoint = Instant::now();

        let endpoints: Vec<SocketAddr> = match self.host.clone() {
            // A literal IP needs no resolution; no Resolved event is emitted.
            HostKind::Ip(ip) => vec![SocketAddr::new(ip, self.port)],
            HostKind::Name(name) => {
                let resolved: Vec<SocketAddr> = lookup_host((name.as_str(), self.port))
                    .await
                    .map_err(|_| ErrorKind::Resolve)?
                    .collect();
                if resolved.is_empty() {
                    return Err(ErrorKind::Resolve);
                }
                let ms = self.lap();
                self.emit(SessionEvent::Resolved { ms });
                resolved
            }
        };

        // Walk the resolver results in order; only failing them all counts.
        let mut stream = None;
        for addr in endpoints {
            if let Ok(connected) = TcpStream::connect(addr).await {
                stream = Some(connected);
                break;
            }
        }
        let Some(stream) = stream else {
            return Err(ErrorKind::Connect);
        };

        let ms = self.lap();
        self.emit(SessionEvent::Connected { ms });
        Ok(stream)
    }

    async fn header_phase(
        &mut self,
        stream: &mut TcpStream,
        watchdog: &mut Watchdog,
        buf: &mut BytesMut,
    ) -> Result<(), ErrorKind> {
        while find_header_end(buf).is_none() {
            tokio::select! {
                read = stream.read_buf(buf) => match read {
                    Ok(0) => return Err(ErrorKind::Recv),
                    Ok(_) => {}
                    Err(_) => return Err(ErrorKind::Recv),
                },
                starved = watchdog.tick(self.content_bytes) => {
                    if starved {
                        return Err(ErrorKind::TimeoutForNoData);
                    }
                }
            }
        }

        let ms = self.lap();

        let Some(status) = parse_status_line(buf) else {
            return Err(ErrorKind::BadHttp);
        };
        if status != 200 {
            println!("http resp code: {status}");
            return Err(ErrorKind::BadHttp);
        }

        self.emit(SessionEvent::RecvHeader { ms });

        // Headers are not exposed; drop the whole buffer, including any
        // over-read body bytes.
        buf.clear();
        Ok(())
    }

    async fn first_chunk_phase(
        &mut self,
        stream: &mut TcpStream,
        watchdog: &mut Watchdog,
        buf: &mut BytesMut,
    ) -> Result<Flow, ErrorKind> {
        match self
            .read_block(stream, watchdog, buf, FIRST_CHUNK_LEN)
            .await?
        {
            BlockRead::Full => {
                let ms = self.lap();
                self.emit(SessionEvent::FirstChunk { ms });

                let chunk = buf.len() as u64;
                buf.clear();
                self.content_bytes += chunk;
                self.emit(SessionEvent::TotalBytes {
                    total: self.content_bytes,
                });

                self.checkpoint = Instant::now();
                Ok(Flow::Continue)
            }
            BlockRead::Eof => {
                // Stream ended inside the probe; the partial bytes are not
                // counted.
                buf.clear();
                Ok(Flow::Eof)
            }
        }
    }

    async fn streaming_phase(
        &mut self,
        stream: &mut TcpStream,
        watchdog: &mut Watchdog,
        buf: &mut BytesMut,
    ) -> Result<(), ErrorKind> {
        loop {
            let read = self
                .read_block(stream, watchdog, buf, RECV_BLOCK_SIZE)
                .await?;

            let block = buf.len() as u64;
            buf.clear();

            if block > 0 {
                self.content_bytes += block;
                self.stats_bytes += block;

                if self.stats_bytes > STATS_WINDOW_SIZE {
                    let ms = self.lap().max(1);
                    self.emit(SessionEvent::Content {
                        bytes: self.stats_bytes,
                        ms,
                    });
                    self.stats_bytes = 0;
                }
            }

            match read {
                BlockRead::Full => {
                    self.emit(SessionEvent::TotalBytes {
                        total: self.content_bytes,
                    });
                }
                BlockRead::Eof => return Ok(()),
            }
        }
    }

    /// Read until `buf` holds `want` bytes, an EOF, or a watchdog starvation.
    async fn read_block(
        &mut self,
        stream: &mut TcpStream,
        watchdog: &mut Watchdog,
        buf: &mut BytesMut,
        want: usize,
    ) -> Result<BlockRead, ErrorKind> {
        while buf.len() < want {
            let need = want - buf.len();
            let mut limited = (&mut *buf).limit(need);
            tokio::select! {
                read = stream.read_buf(&mut limited) => match read {
                    Ok(0) => return Ok(BlockRead::Eof),
                    Ok(_) => {}
                    Err(_) => return Err(ErrorKind::Recv),
                },
                starved = watchdog.tick(self.content_bytes) => {
                    if starved {
                        return Err(ErrorKind::TimeoutForNoData);
                    }
                }
            }
        }
        Ok(BlockRead::Full)
    }

    /// Milliseconds since the last checkpoint; resets the checkpoint.
    fn lap(&mut self) -> i32 {
        let now = Instant::now();
        let ms = now
            .duration_since(self.checkpoint)
            .as_millis()
            .min(i32::MAX as u128) as i32;
        self.checkpoint = now;
        ms
    }

    fn emit(&self, event: SessionEvent) {
        // The arena may already be gone during shutdown.
        let _ = self.events.send((self.id, event));
    }
}

/// Inactivity timer: fires every `period` and reports starvation when the
/// byte counter did not move since the previous firing.
struct Watchdog {
    timer: Pin<Box<Sleep>>,
    period: Duration,
    snapshot: u64,
}

impl Watchdog {
    fn arm(period: Duration, snapshot: u64) -> Self {
        Self {
            timer: Box::pin(tokio::time::sleep(period)),
            period,
            snapshot,
        }
    }

    /// Resolves when the timer fires. `true` means no byte growth since the
    /// last snapshot; on growth the timer re-arms against a fresh snapshot.
    async fn tick(&mut self, content_bytes: u64) -> bool {
        self.timer.as_mut().await;
        if content_bytes == self.snapshot {
            return true;
        }
        self.snapshot = content_bytes;
        self.timer.as_mut().reset(Instant::now() + self.period);
        false
    }
}

fn build_request(url: &Url) -> String {
    let path = url.path();
    let target = match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let host = url.host_str().unwrap_or_default();

    format!(
        "GET {target} HTTP/1.1\r\n\
         User-Agent: Mozilla/5.0 (Windows NT 6.1; WOW64)\r\n\
         Host: {host}\r\n\
         Accept: */*\r\n\
         Connection: keep-alive\r\n\
         \r\n"
    )
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// First two whitespace-separated tokens of the response: an `HTTP/`-prefixed
/// version and a numeric status code.
fn parse_status_line(buf: &[u8]) -> Option<u32> {
    let text = String::from_utf8_lossy(buf);
    let mut tokens = text.split_whitespace();
    let version = tokens.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    tokens.next()?.parse().ok()
}
