//! LiveSplit Server client
//!
//! Action commands are fire-and-forget: a failed send is logged and dropped,
//! and the broken stream is discarded so the connection monitor can open a
//! fresh one. Queries are cached for `read_interval`.

use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::protocol::{parse_time, TimerCommand, TimerPhase};
use crate::config::LiveSplitConfig;

/// The timer operations the run state machine relies on
pub trait Timer: Send {
    /// Whether the timer service is reachable
    fn is_connected(&self) -> bool;

    /// Best-effort send of an action command
    fn send(&self, command: TimerCommand);

    /// Elapsed time, `None` when unknown
    fn current_time(&self) -> Option<Duration>;

    fn start_timer(&self) {
        self.send(TimerCommand::StartTimer);
    }

    fn split_timer(&self) {
        self.send(TimerCommand::Split);
    }

    fn reset_timer(&self) {
        self.send(TimerCommand::Reset);
    }

    fn pause_game_time(&self) {
        self.send(TimerCommand::PauseGameTime);
    }

    fn resume_game_time(&self) {
        self.send(TimerCommand::UnpauseGameTime);
    }
}

#[derive(Debug, Clone, Copy)]
struct Cached<T> {
    value: Option<T>,
    read_at: Option<Instant>,
}

impl<T: Copy> Cached<T> {
    fn empty() -> Self {
        Self {
            value: None,
            read_at: None,
        }
    }

    fn fresh(&self, interval: Duration, now: Instant) -> Option<Option<T>> {
        match self.read_at {
            Some(at) if now.saturating_duration_since(at) < interval => Some(self.value),
            _ => None,
        }
    }

    fn store(&mut self, value: Option<T>, now: Instant) -> Option<T> {
        self.value = value;
        self.read_at = Some(now);
        value
    }
}

#[derive(Debug)]
struct QueryCache {
    current_time: Cached<Duration>,
    final_time: Cached<Duration>,
    phase: Cached<TimerPhase>,
}

impl QueryCache {
    fn new() -> Self {
        Self {
            current_time: Cached::empty(),
            final_time: Cached::empty(),
            phase: Cached::empty(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: LiveSplitConfig,
    connected: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
    cache: Mutex<QueryCache>,
}

/// Connection to a LiveSplit Server. Cheap to clone; clones share the socket.
#[derive(Debug, Clone)]
pub struct LiveSplitClient {
    inner: Arc<Inner>,
}

impl LiveSplitClient {
    pub fn new(config: LiveSplitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connected: AtomicBool::new(false),
                stream: Mutex::new(None),
                cache: Mutex::new(QueryCache::new()),
            }),
        }
    }

    pub fn config(&self) -> &LiveSplitConfig {
        &self.inner.config
    }

    fn address(&self) -> Option<SocketAddr> {
        let config = &self.inner.config;
        match (config.host.as_str(), config.port).to_socket_addrs() {
            Ok(mut addrs) => addrs.next(),
            Err(e) => {
                log::warn!("Cannot resolve LiveSplit host '{}': {}", config.host, e);
                None
            }
        }
    }

    /// Lightweight reachability check: open and drop a connection
    pub fn probe(&self) -> bool {
        self.address()
            .map(|addr| TcpStream::connect_timeout(&addr, self.inner.config.probe_timeout()).is_ok())
            .unwrap_or(false)
    }

    /// Whether a command stream is open
    pub fn has_stream(&self) -> bool {
        self.inner.stream.lock().is_some()
    }

    /// Open the command stream if it is not open yet
    pub fn connect(&self) -> bool {
        let mut guard = self.inner.stream.lock();
        if guard.is_some() {
            return true;
        }

        let Some(addr) = self.address() else {
            return false;
        };

        let timeout = self.inner.config.io_timeout();
        let stream = TcpStream::connect_timeout(&addr, timeout).and_then(|stream| {
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
            stream.set_nodelay(true)?;
            Ok(stream)
        });

        match stream {
            Ok(stream) => {
                log::debug!("LiveSplit command stream opened to {}", addr);
                *guard = Some(stream);
                true
            }
            Err(e) => {
                log::debug!("LiveSplit connect to {} failed: {}", addr, e);
                false
            }
        }
    }

    /// Close the command stream
    pub fn disconnect(&self) {
        if self.inner.stream.lock().take().is_some() {
            log::debug!("LiveSplit command stream closed");
        }
    }

    /// Record connectivity; returns true if it changed
    pub fn set_connected(&self, connected: bool) -> bool {
        self.inner.connected.swap(connected, Ordering::SeqCst) != connected
    }

    /// Run `op` on the command stream, discarding the stream on I/O failure
    fn with_stream<T>(
        &self,
        command: TimerCommand,
        op: impl FnOnce(&mut TcpStream) -> io::Result<T>,
    ) -> Option<T> {
        let mut guard = self.inner.stream.lock();
        let stream = guard.as_mut()?;

        match op(stream) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("LiveSplit command '{}' failed: {}", command, e);
                *guard = None;
                None
            }
        }
    }

    /// Send a query and read its single-line answer
    pub fn query(&self, command: TimerCommand) -> Option<String> {
        let response = self.with_stream(command, |stream| {
            stream.write_all(command.to_line().as_bytes())?;
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
            }
            let text = String::from_utf8_lossy(&buf[..n]);
            Ok(text.lines().next().unwrap_or_default().trim().to_string())
        })?;

        if response.is_empty() {
            None
        } else {
            Some(response)
        }
    }

    fn cached<T: Copy>(
        &self,
        select: impl Fn(&mut QueryCache) -> &mut Cached<T>,
        command: TimerCommand,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Option<T> {
        let now = Instant::now();
        let interval = self.inner.config.read_interval();
        if let Some(value) = select(&mut *self.inner.cache.lock()).fresh(interval, now) {
            return value;
        }

        let value = self.query(command).and_then(|response| {
            let parsed = parse(&response);
            if parsed.is_none() {
                log::debug!("Unparseable '{}' response: {:?}", command, response);
            }
            parsed
        });
        select(&mut *self.inner.cache.lock()).store(value, now)
    }

    /// Final time of the last finished run
    pub fn final_time(&self) -> Option<Duration> {
        self.cached(|c| &mut c.final_time, TimerCommand::GetFinalTime, parse_time)
    }

    /// Current timer phase
    pub fn timer_phase(&self) -> Option<TimerPhase> {
        self.cached(|c| &mut c.phase, TimerCommand::GetCurrentTimerPhase, |s| {
            s.parse().ok()
        })
    }
}

impl Timer for LiveSplitClient {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn send(&self, command: TimerCommand) {
        let sent = self.with_stream(command, |stream| {
            stream.write_all(command.to_line().as_bytes())
        });
        match sent {
            Some(()) => log::debug!("LiveSplit <- {}", command),
            None => log::debug!("LiveSplit command '{}' dropped", command),
        }
    }

    fn current_time(&self) -> Option<Duration> {
        self.cached(|c| &mut c.current_time, TimerCommand::GetCurrentTime, parse_time)
    }
}
