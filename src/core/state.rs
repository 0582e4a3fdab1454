//! Run state types

use serde::{Deserialize, Serialize};

use crate::livesplit::TimerPhase;
use crate::route::LoadType;

/// Where the engine is in the life of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run in progress
    #[default]
    Idle,
    /// Split 0 selected, timer starts on the first external advance
    WaitingForFirstSplit,
    /// Waiting for the timer to report a nonzero time
    WaitingForTimerStart,
    /// Splits are being tracked
    Running,
    /// All splits done, waiting for the timer to be reset
    WaitingForReset,
}

impl RunPhase {
    /// Whether the timer has been started for this run
    pub fn is_started(&self) -> bool {
        matches!(self, RunPhase::Running | RunPhase::WaitingForReset)
    }
}

/// Per-run counters, owned by the state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    pub phase: RunPhase,
    /// Current split; equal to the route length once the run is finished
    pub split_index: usize,
    pub component_index: usize,
    /// Loads counted since the last `reset_load_count` split
    pub load_count: u32,
    pub last_load_type: Option<LoadType>,
    /// Game time is paused for a load
    pub in_load: bool,
    /// Frames without an active load since the last one ended
    pub frames_since_load: u32,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to initial values
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Engine status for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NoRoute,
    EmptyRoute,
    TimerDisconnected,
    WaitingForTimerStart,
    WaitingForReset,
    /// The frame source delivered nothing on the last tick
    NoSignal,
    Ready,
    Running,
    /// These load types have no model and will never be detected
    Degraded(Vec<LoadType>),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::NoRoute => f.write_str("No route loaded"),
            Status::EmptyRoute => f.write_str("Route has no splits"),
            Status::TimerDisconnected => f.write_str("LiveSplit not connected"),
            Status::WaitingForTimerStart => f.write_str("Waiting for LiveSplit to start"),
            Status::WaitingForReset => f.write_str("Waiting for LiveSplit to reset"),
            Status::NoSignal => f.write_str("No video signal"),
            Status::Ready => f.write_str("Ready"),
            Status::Running => f.write_str("Running"),
            Status::Degraded(missing) => {
                let names: Vec<&str> = missing.iter().map(|lt| lt.as_str()).collect();
                write!(f, "No model for {}", names.join(", "))
            }
        }
    }
}

/// Read-only view of the engine, published after every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub status: Status,
    pub phase: RunPhase,
    pub route_name: Option<String>,
    pub split_count: usize,
    pub split_index: usize,
    pub split_name: Option<String>,
    pub component_index: usize,
    pub load_count: u32,
    /// Loads the current split waits for
    pub expected_loads: Option<u32>,
    pub connected: bool,
    pub timer_phase: Option<TimerPhase>,
    pub last_load_type: Option<LoadType>,
    pub in_load: bool,
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self {
            status: Status::NoRoute,
            phase: RunPhase::Idle,
            route_name: None,
            split_count: 0,
            split_index: 0,
            split_name: None,
            component_index: 0,
            load_count: 0,
            expected_loads: None,
            connected: false,
            timer_phase: None,
            last_load_type: None,
            in_load: false,
        }
    }
}

impl RunSnapshot {
    /// Whether every split has been completed
    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::WaitingForReset
    }
}
