//! Error types for the autosplitter

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, AutosplitterError>;

/// Errors surfaced by construction and control operations.
///
/// Nothing on the per-frame path returns one of these: grab failures, socket
/// failures and malformed timer responses are logged and degrade to `None`.
#[derive(Debug, Error)]
pub enum AutosplitterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid route document: {0}")]
    RouteParse(#[from] serde_json::Error),

    #[error("Invalid LiveSplit segment file: {0}")]
    SegmentFile(String),

    #[error("Capture device error: {0}")]
    Device(String),

    #[error("Autosplitter already running")]
    AlreadyRunning,

    #[error("Autosplitter not running")]
    NotRunning,

    #[error("Engine channel closed")]
    ChannelClosed,
}

impl From<quick_xml::Error> for AutosplitterError {
    fn from(err: quick_xml::Error) -> Self {
        AutosplitterError::SegmentFile(err.to_string())
    }
}
