//! LiveSplit Server integration
//!
//! Talks the LiveSplit Server text protocol over TCP (default port 16834).
//! The [`Timer`] trait is what the run state machine sees; [`LiveSplitClient`]
//! implements it over a socket and [`ConnectionMonitor`] keeps that socket
//! alive from a background thread.

pub mod client;
pub mod monitor;
pub mod protocol;

pub use client::{LiveSplitClient, Timer};
pub use monitor::ConnectionMonitor;
pub use protocol::{parse_time, ResetDetector, TimerCommand, TimerPhase, UnknownPhase};

/// Default LiveSplit Server port
pub const DEFAULT_PORT: u16 = 16834;
