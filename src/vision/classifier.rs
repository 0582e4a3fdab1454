//! Per-frame load classifiers with hysteresis
//!
//! A classifier keeps a signed vote counter clamped to
//! `[-threshold, threshold]`. A "load" vote from a negative counter restarts
//! it at zero, otherwise increments it; a "no load" vote mirrors that. The
//! classifier reports a load while the counter sits at `+threshold`.

use std::time::{Duration, Instant};

use super::capture::Frame;
use super::detector::{Oracle, LOAD_CLASS};
use super::preprocess::Preprocessor;
use crate::route::LoadType;

/// Default hysteresis threshold in frames
pub const DEFAULT_THRESHOLD: u32 = 5;

/// Stateful load classifier for one load type
pub struct LoadClassifier {
    load_type: LoadType,
    preprocessor: Box<dyn Preprocessor>,
    oracle: Option<Box<dyn Oracle>>,
    threshold: i32,
    count: i32,
    idle_reset: Duration,
    last_update: Option<Instant>,
}

impl LoadClassifier {
    /// Create a classifier. A `None` oracle makes it never detect.
    pub fn new(
        load_type: LoadType,
        preprocessor: Box<dyn Preprocessor>,
        oracle: Option<Box<dyn Oracle>>,
        threshold: u32,
    ) -> Self {
        if oracle.is_none() {
            log::warn!("No model available for {} loads, detection disabled", load_type);
        }
        Self {
            load_type,
            preprocessor,
            oracle,
            threshold: threshold.clamp(1, i32::MAX as u32) as i32,
            count: 0,
            idle_reset: Duration::from_secs(1),
            last_update: None,
        }
    }

    /// Restart the counter when updates are further apart than `idle_reset`
    pub fn with_idle_reset(mut self, idle_reset: Duration) -> Self {
        self.idle_reset = idle_reset;
        self
    }

    pub fn load_type(&self) -> LoadType {
        self.load_type
    }

    /// Whether an oracle is loaded
    pub fn is_available(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold as u32
    }

    /// Classify a frame now
    pub fn update(&mut self, frame: &Frame) -> bool {
        self.update_at(frame, Instant::now())
    }

    /// Classify a frame observed at `now`
    pub fn update_at(&mut self, frame: &Frame, now: Instant) -> bool {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) > self.idle_reset {
                self.count = 0;
            }
        }
        self.last_update = Some(now);

        let Some(oracle) = self.oracle.as_mut() else {
            return false;
        };

        let features = self.preprocessor.preprocess(frame);
        match oracle.predict(&features) {
            Some(class) => self.vote(class == LOAD_CLASS),
            None => {
                log::debug!("{} oracle produced no prediction", self.load_type);
                return false;
            }
        }

        self.count >= self.threshold
    }

    fn vote(&mut self, is_load: bool) {
        if is_load {
            self.count = if self.count < 0 { 0 } else { self.count + 1 };
        } else {
            self.count = if self.count > 0 { 0 } else { self.count - 1 };
        }
        self.count = self.count.clamp(-self.threshold, self.threshold);
    }

    /// Sustained negative signal
    pub fn check_reset(&self) -> bool {
        self.count <= -self.threshold
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_update = None;
    }
}

impl std::fmt::Debug for LoadClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadClassifier")
            .field("load_type", &self.load_type)
            .field("available", &self.is_available())
            .field("threshold", &self.threshold)
            .field("count", &self.count)
            .finish()
    }
}
