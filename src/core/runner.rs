//! Main autosplitter runner
//!
//! Owns the frame source, the LiveSplit client and the state machine. The
//! state machine lives on the frame loop thread; everything else talks to it
//! through a command channel and reads the published [`RunSnapshot`].

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::events::{EngineEvent, EventHandler, RunCallback};
use super::machine::RunStateMachine;
use super::state::RunSnapshot;
use crate::config::AutosplitterConfig;
use crate::livesplit::{ConnectionMonitor, LiveSplitClient};
use crate::route::Route;
use crate::vision::FrameSource;
use crate::{AutosplitterError, Result};

/// Interval between attempts to reopen a lost capture device
const SOURCE_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between frame statistics log lines
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Control requests from the UI layer
#[derive(Debug)]
enum Command {
    Start,
    Advance,
    Skip,
    Undo,
    Reset,
    LoadRoute(Box<Route>),
    CloseRoute,
}

/// Main autosplitter runner
pub struct Autosplitter {
    config: AutosplitterConfig,
    client: LiveSplitClient,
    /// Route handed to the next frame loop
    route: Option<Route>,
    running: Arc<AtomicBool>,
    commands: Option<Sender<Command>>,
    snapshot: Arc<RwLock<RunSnapshot>>,
    events: Arc<Mutex<EventHandler>>,
    worker: Option<JoinHandle<()>>,
    monitor: Option<ConnectionMonitor>,
}

impl Autosplitter {
    pub fn new(config: AutosplitterConfig) -> Self {
        let client = LiveSplitClient::new(config.livesplit.clone());
        Self {
            config,
            client,
            route: None,
            running: Arc::new(AtomicBool::new(false)),
            commands: None,
            snapshot: Arc::new(RwLock::new(RunSnapshot::default())),
            events: Arc::new(Mutex::new(EventHandler::new())),
            worker: None,
            monitor: None,
        }
    }

    pub fn config(&self) -> &AutosplitterConfig {
        &self.config
    }

    pub fn client(&self) -> &LiveSplitClient {
        &self.client
    }

    /// Check if the frame loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest published state
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot.read().clone()
    }

    /// Register a callback for run events
    pub fn on_event(&self, callback: RunCallback) {
        self.events.lock().on_event(callback);
    }

    /// Spawn the frame loop over `source` and the LiveSplit monitor
    pub fn run(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AutosplitterError::AlreadyRunning);
        }

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let monitor = ConnectionMonitor::spawn(self.client.clone(), event_tx)?;

        let mut machine = RunStateMachine::from_config(self.client.clone(), &self.config);
        if let Some(route) = self.route.clone() {
            machine.load_route(route);
        }

        let frame_loop = FrameLoop {
            running: self.running.clone(),
            source,
            machine,
            commands: command_rx,
            engine_events: event_rx,
            snapshot: self.snapshot.clone(),
            events: self.events.clone(),
            device: self.config.capture.device.clone(),
            idle_sleep: self.config.capture.frame_interval(),
        };

        self.running.store(true, Ordering::SeqCst);
        let worker = thread::Builder::new()
            .name("autosplitter".to_string())
            .spawn(move || frame_loop.run());

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        self.commands = Some(command_tx);
        self.worker = Some(worker);
        self.monitor = Some(monitor);
        log::info!("Autosplitter started");
        Ok(())
    }

    /// Stop both threads. Does nothing if not running.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.commands = None;

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Autosplitter frame loop panicked");
            }
            log::info!("Autosplitter stopped");
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        let commands = self.commands.as_ref().ok_or(AutosplitterError::NotRunning)?;
        commands
            .send(command)
            .map_err(|_| AutosplitterError::ChannelClosed)
    }

    /// Start the run now
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Complete the current split from outside the detection path
    pub fn advance(&self) -> Result<()> {
        self.send(Command::Advance)
    }

    pub fn skip_split(&self) -> Result<()> {
        self.send(Command::Skip)
    }

    pub fn undo_split(&self) -> Result<()> {
        self.send(Command::Undo)
    }

    /// Reset the run and the timer
    pub fn reset_run(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    /// Use `route` from now on. Works before `run` too.
    pub fn load_route(&mut self, route: Route) -> Result<()> {
        self.route = Some(route.clone());
        if self.is_running() {
            self.send(Command::LoadRoute(Box::new(route)))?;
        }
        Ok(())
    }

    pub fn close_route(&mut self) -> Result<()> {
        self.route = None;
        if self.is_running() {
            self.send(Command::CloseRoute)?;
        }
        Ok(())
    }
}

impl Drop for Autosplitter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the frame loop thread owns
struct FrameLoop {
    running: Arc<AtomicBool>,
    source: Box<dyn FrameSource>,
    machine: RunStateMachine<LiveSplitClient>,
    commands: Receiver<Command>,
    engine_events: Receiver<EngineEvent>,
    snapshot: Arc<RwLock<RunSnapshot>>,
    events: Arc<Mutex<EventHandler>>,
    device: String,
    idle_sleep: Duration,
}

impl FrameLoop {
    fn apply(&mut self, command: Command) {
        log::debug!("Command {:?}", command);
        match command {
            Command::Start => self.machine.start(),
            Command::Advance => self.machine.advance_on_external_signal(),
            Command::Skip => self.machine.skip_split(),
            Command::Undo => self.machine.undo_split(),
            Command::Reset => self.machine.reset_run(),
            Command::LoadRoute(route) => self.machine.load_route(*route),
            Command::CloseRoute => self.machine.close_route(),
        }
    }

    fn open_source(&mut self) {
        match self.source.open(&self.device) {
            Ok(()) => log::info!("Capture source '{}' connected", self.device),
            Err(e) => log::debug!("Waiting for capture source '{}': {}", self.device, e),
        }
    }

    fn publish(&mut self) {
        let events = self.machine.drain_events();
        if !events.is_empty() {
            let handler = self.events.lock();
            for event in &events {
                handler.emit(event);
            }
        }
        *self.snapshot.write() = self.machine.snapshot();
    }

    fn run(mut self) {
        let mut last_source_check: Option<Instant> = None;
        let mut frame_count: u64 = 0;
        let mut last_log = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            while let Ok(command) = self.commands.try_recv() {
                self.apply(command);
            }
            while let Ok(event) = self.engine_events.try_recv() {
                self.machine.handle_event(event);
            }

            if !self.source.is_healthy()
                && last_source_check.map_or(true, |t| t.elapsed() >= SOURCE_RETRY_INTERVAL)
            {
                last_source_check = Some(Instant::now());
                self.open_source();
            }

            let frame = if self.source.is_healthy() {
                self.source.next_frame()
            } else {
                None
            };

            if frame.is_some() {
                frame_count += 1;
            }
            self.machine.process_frame(frame.as_ref(), Instant::now());
            self.publish();

            if last_log.elapsed() >= STATS_INTERVAL {
                let snapshot = self.snapshot.read().clone();
                log::info!(
                    "Autosplitter: {} frames processed, split {}/{}, {} loads, status: {}",
                    frame_count,
                    snapshot.split_index,
                    snapshot.split_count,
                    snapshot.load_count,
                    snapshot.status
                );
                last_log = Instant::now();
            }

            if frame.is_none() {
                thread::sleep(self.idle_sleep);
            }
        }

        self.source.release();
        log::debug!("Frame loop exited after {} frames", frame_count);
    }
}
