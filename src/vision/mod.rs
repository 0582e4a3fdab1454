//! Video-based load detection
//!
//! This module turns a capture card feed into discrete load events:
//! frames come from a [`FrameSource`], each load type has a
//! [`LoadClassifier`] with its own preprocessing, and the
//! [`DetectionCoordinator`] rate-limits their output into [`DetectionEvent`]s.
//!
//! # Example
//!
//! ```ignore
//! use nsmbw_autosplitter::vision::{CaptureDevice, DetectionCoordinator, FrameDirectory, FrameSource};
//!
//! let mut source = CaptureDevice::new(FrameDirectory::new(false), 30);
//! source.open("recordings/1-1")?;
//! let mut coordinator = DetectionCoordinator::from_config(&config.detection, &config.classifiers);
//! while let Some(frame) = source.next_frame() {
//!     if let Some(event) = coordinator.poll(&frame, LoadType::RegularFade, 1, Instant::now()) {
//!         println!("{} load", event.load_type);
//!     }
//! }
//! ```

pub mod capture;
pub mod classifier;
pub mod coordinator;
pub mod detector;
pub mod preprocess;

pub use capture::{
    CaptureDevice, ChannelBackend, DeviceBackend, Frame, FrameDirectory, FrameSource, FRAME_HEIGHT,
    FRAME_WIDTH,
};
pub use classifier::LoadClassifier;
pub use coordinator::{DetectionCoordinator, DetectionEvent};
pub use detector::{oracle_from_config, DarkFrameOracle, Oracle, SwitchDetector, TextOnBlackOracle};
pub use preprocess::{Features, Preprocessor, RegionPreprocessor};
