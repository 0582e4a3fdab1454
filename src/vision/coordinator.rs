//! Detection coordinator
//!
//! Turns classifier booleans into discrete, rate-limited [`DetectionEvent`]s:
//! one event per rising edge, and no event within the cooldown window that
//! follows an accepted detection.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::capture::Frame;
use super::classifier::LoadClassifier;
use super::detector::oracle_from_config;
use super::preprocess::RegionPreprocessor;
use crate::config::{ClassifiersConfig, DetectionConfig};
use crate::route::LoadType;

/// A load transition accepted by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionEvent {
    pub load_type: LoadType,
    pub timestamp: Instant,
}

/// Wraps the load classifiers with cooldown and edge tracking
#[derive(Debug)]
pub struct DetectionCoordinator {
    classifiers: HashMap<LoadType, LoadClassifier>,
    cooldown: Duration,
    last_detection: Option<Instant>,
    /// Classifier whose signal is currently high
    active: Option<LoadType>,
}

impl DetectionCoordinator {
    /// Create an empty coordinator
    pub fn new(cooldown: Duration) -> Self {
        Self {
            classifiers: HashMap::new(),
            cooldown,
            last_detection: None,
            active: None,
        }
    }

    /// Build all four classifiers from configuration
    pub fn from_config(detection: &DetectionConfig, classifiers: &ClassifiersConfig) -> Self {
        let mut coordinator = Self::new(detection.cooldown());
        for load_type in LoadType::ALL {
            let classifier = LoadClassifier::new(
                load_type,
                Box::new(RegionPreprocessor::for_load_type(load_type)),
                oracle_from_config(classifiers.for_load_type(load_type)),
                detection.hysteresis_threshold,
            )
            .with_idle_reset(detection.idle_reset());
            coordinator.insert(classifier);
        }
        coordinator
    }

    /// Add or replace the classifier for its load type
    pub fn insert(&mut self, classifier: LoadClassifier) {
        self.classifiers.insert(classifier.load_type(), classifier);
    }

    pub fn with_classifier(mut self, classifier: LoadClassifier) -> Self {
        self.insert(classifier);
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a load signal is currently high
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Load types that cannot be detected because their model is missing
    pub fn unavailable(&self) -> Vec<LoadType> {
        LoadType::ALL
            .into_iter()
            .filter(|lt| !self.classifiers.get(lt).map(|c| c.is_available()).unwrap_or(false))
            .collect()
    }

    /// Load types that can never be detected, counting the regular fade fallback
    pub fn undetectable(&self) -> Vec<LoadType> {
        let fallback = self.is_available(LoadType::RegularFade);
        self.unavailable()
            .into_iter()
            .filter(|lt| !(fallback && lt.is_fade()))
            .collect()
    }

    /// Whether we are inside the cooldown window at `now`
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.last_detection
            .map(|last| now.saturating_duration_since(last) < self.cooldown)
            .unwrap_or(false)
    }

    fn is_available(&self, load_type: LoadType) -> bool {
        self.classifiers
            .get(&load_type)
            .map(|c| c.is_available())
            .unwrap_or(false)
    }

    /// Pick the classifier for the running split.
    ///
    /// Every level opens with a banner, so a zero load count always selects the
    /// banner classifier. Fade variants without a model fall back to the
    /// regular fade classifier.
    pub fn select(&self, requested: LoadType, load_count: u32) -> LoadType {
        let wanted = if load_count == 0 {
            LoadType::BannerLoad
        } else {
            requested
        };

        if wanted.is_fade() && wanted != LoadType::RegularFade && !self.is_available(wanted) {
            LoadType::RegularFade
        } else {
            wanted
        }
    }

    /// Feed one frame; returns an event on an accepted rising edge
    pub fn poll(
        &mut self,
        frame: &Frame,
        requested: LoadType,
        load_count: u32,
        now: Instant,
    ) -> Option<DetectionEvent> {
        // Inside the cooldown only the falling edge of an active signal is tracked
        if self.in_cooldown(now) && self.active.is_none() {
            return None;
        }

        // While a signal is high, keep listening to the classifier that raised it
        let kind = self
            .active
            .unwrap_or_else(|| self.select(requested, load_count));

        let Some(classifier) = self.classifiers.get_mut(&kind) else {
            self.active = None;
            return None;
        };

        if !classifier.update_at(frame, now) {
            self.active = None;
            return None;
        }

        if self.active.is_some() {
            return None;
        }

        self.active = Some(kind);
        self.last_detection = Some(now);
        log::info!("{} load detected", kind);

        Some(DetectionEvent {
            load_type: kind,
            timestamp: now,
        })
    }

    /// Forget edges, cooldown and classifier counters
    pub fn reset(&mut self) {
        self.active = None;
        self.last_detection = None;
        for classifier in self.classifiers.values_mut() {
            classifier.reset();
        }
    }
}
