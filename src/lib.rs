//! NSMBW Autosplitter
//!
//! A video-based autosplitter library for New Super Mario Bros. Wii.
//! Watches a capture feed for loading screens and drives LiveSplit through
//! the LiveSplit Server text protocol.
//!
//! The pieces, leaf first:
//! - [`vision`]: frame sources, load classifiers and the detection coordinator
//! - [`livesplit`]: timer client and connectivity monitor
//! - [`route`]: split definitions loaded from `.nsmbw` or `.lss` files
//! - [`core`]: the run state machine and the threaded [`Autosplitter`] runner

pub mod config;
pub mod core;
pub mod error;
pub mod livesplit;
pub mod route;
pub mod vision;

// Re-export commonly used types
pub use config::AutosplitterConfig;
pub use crate::core::{Autosplitter, RunEvent, RunEventKind, RunPhase, RunSnapshot, RunStateMachine, Status};
pub use error::{AutosplitterError, Result};
pub use livesplit::{LiveSplitClient, Timer, TimerCommand, TimerPhase};
pub use route::{EndCondition, LoadType, Route, Split, SplitAction, StartCondition};
