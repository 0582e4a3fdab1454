//! Connectivity polling loop
//!
//! Runs on its own thread: probes the server every `check_interval`, keeps the
//! command stream open, and publishes connectivity edges and timer phase
//! changes to the frame loop.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::client::LiveSplitClient;
use super::protocol::{ResetDetector, TimerPhase};
use crate::core::EngineEvent;
use crate::Result;

/// Longest single sleep between shutdown checks
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Handle to the polling thread. Stops the thread on drop.
#[derive(Debug)]
pub struct ConnectionMonitor {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ConnectionMonitor {
    /// Spawn the polling thread
    pub fn spawn(client: LiveSplitClient, events: Sender<EngineEvent>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let worker = thread::Builder::new()
            .name("livesplit-monitor".to_string())
            .spawn(move || run_monitor_loop(flag, client, events))?;

        Ok(Self {
            running,
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown and wait for the thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("LiveSplit monitor thread panicked");
            }
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State carried between polls
#[derive(Debug, Default)]
pub(crate) struct MonitorState {
    phase: Option<TimerPhase>,
    resets: ResetDetector,
}

impl MonitorState {
    /// Events produced by one poll result
    pub(crate) fn on_poll(
        &mut self,
        client: &LiveSplitClient,
        reachable: bool,
        phase: Option<TimerPhase>,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let connected = reachable && client.has_stream();

        if client.set_connected(connected) {
            if connected {
                log::info!("LiveSplit connected");
            } else {
                log::info!("LiveSplit disconnected");
                self.phase = None;
                self.resets = ResetDetector::new();
            }
            events.push(EngineEvent::ConnectivityChanged(connected));
        }

        let Some(phase) = phase.filter(|_| connected) else {
            return events;
        };

        if self.phase != Some(phase) {
            log::debug!("LiveSplit phase {:?} -> {:?}", self.phase, phase);
            self.phase = Some(phase);
            events.push(EngineEvent::PhaseChanged(phase));
        }

        if self.resets.observe(phase) {
            log::info!("LiveSplit reset detected");
            events.push(EngineEvent::ResetDetected);
        }

        events
    }
}

fn run_monitor_loop(running: Arc<AtomicBool>, client: LiveSplitClient, events: Sender<EngineEvent>) {
    let interval = client.config().check_interval();
    let mut state = MonitorState::default();

    log::debug!(
        "LiveSplit monitor polling {}:{} every {:?}",
        client.config().host,
        client.config().port,
        interval
    );

    while running.load(Ordering::SeqCst) {
        let poll_start = Instant::now();

        let reachable = client.probe();
        if reachable {
            client.connect();
        } else {
            client.disconnect();
        }

        let phase = if reachable { client.timer_phase() } else { None };

        for event in state.on_poll(&client, reachable, phase) {
            if events.send(event).is_err() {
                log::debug!("Event receiver gone, stopping LiveSplit monitor");
                return;
            }
        }

        while running.load(Ordering::SeqCst) {
            let elapsed = poll_start.elapsed();
            if elapsed >= interval {
                break;
            }
            thread::sleep((interval - elapsed).min(SLEEP_SLICE));
        }
    }

    client.set_connected(false);
    client.disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LiveSplitConfig;

    #[test]
    fn test_unreachable_emits_nothing_when_already_disconnected() {
        let client = LiveSplitClient::new(LiveSplitConfig::default());
        let mut state = MonitorState::default();
        assert!(state.on_poll(&client, false, None).is_empty());
        assert!(state.on_poll(&client, false, None).is_empty());
    }

    #[test]
    fn test_disconnect_edge_fires_once() {
        let client = LiveSplitClient::new(LiveSplitConfig::default());
        client.set_connected(true);
        let mut state = MonitorState::default();

        let events = state.on_poll(&client, false, Some(TimerPhase::Running));
        assert_eq!(events, vec![EngineEvent::ConnectivityChanged(false)]);
        assert!(state.on_poll(&client, false, None).is_empty());
    }
}
