//! Events flowing into and out of the run engine

use std::time::Instant;

use crate::livesplit::TimerPhase;
use crate::route::LoadType;
use crate::vision::DetectionEvent;

/// Notifications consumed by the frame loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A load transition accepted by the detection coordinator
    Detection(DetectionEvent),
    /// The timer service became reachable or unreachable
    ConnectivityChanged(bool),
    /// The timer reported a different phase
    PhaseChanged(TimerPhase),
    /// The timer was reset outside of this tool
    ResetDetected,
}

/// What kind of run progress happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEventKind {
    /// Timer started and split 0 is live
    RunStarted,
    /// Waiting for the first external advance
    ArmedForFirstSplit,
    /// A load was counted against the current split
    LoadCounted { load_type: LoadType },
    /// Game time paused for a load
    Paused,
    /// Game time resumed after a load
    Resumed,
    /// Moved from `from` to the next split
    SplitCompleted { from: usize, sent_split: bool },
    /// Manual skip to the next split
    Skipped { from: usize },
    /// Manual step back to the previous split
    Undone { from: usize },
    /// The last split completed
    RunFinished,
    /// Per-run state cleared
    RunReset { external: bool },
    /// Route replaced or closed
    RouteChanged,
}

/// Event emitted to observers of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub kind: RunEventKind,
    /// Split index after the event
    pub split_index: usize,
    /// Load count after the event
    pub load_count: u32,
    pub timestamp: Instant,
}

impl RunEvent {
    pub fn new(kind: RunEventKind, split_index: usize, load_count: u32) -> Self {
        Self {
            kind,
            split_index,
            load_count,
            timestamp: Instant::now(),
        }
    }
}

/// Callback type for run events
pub type RunCallback = Box<dyn Fn(&RunEvent) + Send + Sync>;

/// Event handler that can have multiple listeners
pub struct EventHandler {
    callbacks: Vec<RunCallback>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a listener
    pub fn on_event(&mut self, callback: RunCallback) {
        self.callbacks.push(callback);
    }

    /// Deliver an event to all listeners
    pub fn emit(&self, event: &RunEvent) {
        for callback in &self.callbacks {
            callback(event);
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.callbacks.is_empty()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("listeners", &self.callbacks.len())
            .finish()
    }
}
