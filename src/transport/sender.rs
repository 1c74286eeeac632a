use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::wire::StreamMessage;

pub const DEFAULT_STREAM_ADDR: &str = "127.0.0.1:5005";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(50);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(1000);

/// What happened to one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written on the existing connection.
    Sent,
    /// Written on a connection opened during this call.
    Reconnected,
    /// Not delivered. The frame loop carries on.
    Dropped,
}

/// What to do when a write fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendPolicy {
    /// Drop the message. A later message reconnects once the backoff has
    /// elapsed.
    Drop,
    /// Reconnect once and resend the message before giving up on it.
    #[default]
    ReconnectOnce,
}

impl std::str::FromStr for SendPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(SendPolicy::Drop),
            "reconnect_once" | "reconnect-once" | "reconnect" => Ok(SendPolicy::ReconnectOnce),
            other => Err(anyhow!(
                "unknown send policy '{}' (expected drop or reconnect_once)",
                other
            )),
        }
    }
}

/// Connection settings for the center stream.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Consumer address (e.g., "127.0.0.1:5005").
    pub addr: String,
    /// Bound on the startup connect. Reconnects from the frame loop use the
    /// smaller of this and `send_timeout`.
    pub connect_timeout: Duration,
    /// Upper bound on a single message write.
    pub send_timeout: Duration,
    pub policy: SendPolicy,
    /// Minimum time between the end of one reconnect attempt and the start of
    /// the next.
    pub reconnect_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_STREAM_ADDR.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            policy: SendPolicy::default(),
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

/// Counters for a sender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub sent: u64,
    pub reconnected: u64,
    pub dropped: u64,
    pub reconnect_attempts: u64,
}

impl SenderStats {
    pub fn record(&mut self, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Sent => self.sent += 1,
            SendOutcome::Reconnected => self.reconnected += 1,
            SendOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Anything the frame loop can stream centers into.
///
/// `send` never fails the caller: delivery problems are reported through
/// the outcome.
pub trait CenterSink {
    fn send(&mut self, message: StreamMessage) -> SendOutcome;
}

/// Fire-and-forget TCP sender owning the single consumer connection.
///
/// Each write is bounded by `send_timeout`. After any failed write the
/// socket is discarded: part of the 8 bytes may have gone out, and reusing
/// the stream would shift every later message off its stride.
pub struct TcpSender {
    config: StreamConfig,
    addrs: Vec<SocketAddr>,
    stream: Option<TcpStream>,
    last_attempt: Option<Instant>,
    stats: SenderStats,
}

impl TcpSender {
    /// Open the connection. Failure here is a startup error.
    ///
    /// The address is resolved here once; reconnects reuse the result.
    pub fn connect(config: StreamConfig) -> Result<Self> {
        let addrs: Vec<SocketAddr> = config
            .addr
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve consumer address {}", config.addr))?
            .collect();
        let stream = open_stream(&addrs, config.connect_timeout, config.send_timeout)
            .with_context(|| format!("failed to connect to consumer at {}", config.addr))?;
        log::info!("stream connected to {}", config.addr);
        Ok(Self {
            config,
            addrs,
            stream: Some(stream),
            last_attempt: None,
            stats: SenderStats::default(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Close the connection cleanly. Later sends reconnect per policy.
    pub fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.flush_and_close() {
                log::debug!("stream close to {} failed: {}", self.config.addr, e);
            }
            log::info!("stream to {} closed", self.config.addr);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no connection")),
        }
    }

    fn reconnect(&mut self) -> bool {
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.config.reconnect_backoff {
                return false;
            }
        }
        self.stats.reconnect_attempts += 1;
        let timeout = self.config.connect_timeout.min(self.config.send_timeout);
        let result = open_stream(&self.addrs, timeout, self.config.send_timeout);
        self.last_attempt = Some(Instant::now());
        match result {
            Ok(stream) => {
                log::info!("stream reconnected to {}", self.config.addr);
                self.stream = Some(stream);
                true
            }
            Err(e) => {
                log::warn!("stream reconnect to {} failed: {}", self.config.addr, e);
                false
            }
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> SendOutcome {
        if self.stream.is_some() {
            match self.write(bytes) {
                Ok(()) => return SendOutcome::Sent,
                Err(e) => {
                    log::warn!("stream write to {} failed: {}", self.config.addr, e);
                    self.stream = None;
                    if self.config.policy == SendPolicy::Drop {
                        return SendOutcome::Dropped;
                    }
                }
            }
        }

        if !self.reconnect() {
            return SendOutcome::Dropped;
        }
        match self.write(bytes) {
            Ok(()) => SendOutcome::Reconnected,
            Err(e) => {
                log::warn!(
                    "stream write to {} failed after reconnect: {}",
                    self.config.addr,
                    e
                );
                self.stream = None;
                SendOutcome::Dropped
            }
        }
    }
}

impl CenterSink for TcpSender {
    fn send(&mut self, message: StreamMessage) -> SendOutcome {
        let outcome = self.send_bytes(&message.encode());
        self.stats.record(outcome);
        if outcome == SendOutcome::Dropped {
            log::warn!(
                "dropped center ({:.4}, {:.4}) for {}",
                message.x,
                message.y,
                self.config.addr
            );
        }
        outcome
    }
}

impl Drop for TcpSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}

trait CloseExt {
    fn flush_and_close(self) -> io::Result<()>;
}

impl CloseExt for TcpStream {
    fn flush_and_close(mut self) -> io::Result<()> {
        self.flush()?;
        self.shutdown(Shutdown::Both)
    }
}

fn open_stream(
    addrs: &[SocketAddr],
    connect_timeout: Duration,
    send_timeout: Duration,
) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, connect_timeout) {
            Ok(stream) => {
                stream.set_write_timeout(Some(send_timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "consumer address resolved to nothing",
        )
    }))
}
