//! Core run engine
//!
//! Contains the run state machine, its state types, the engine events and the
//! threaded runner that ties frames, detection and the timer together.

pub mod events;
pub mod machine;
pub mod runner;
pub mod state;

pub use events::{EngineEvent, EventHandler, RunCallback, RunEvent, RunEventKind};
pub use machine::{RunStateMachine, DEFAULT_RESUME_AFTER_FRAMES};
pub use runner::Autosplitter;
pub use state::{RunPhase, RunSnapshot, RunState, Status};
