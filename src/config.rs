//! Configuration types for the autosplitter
//!
//! These types define the structure of the `autosplitter.toml` file. Every
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::route::LoadType;
use crate::Result;

/// Upper bound on any blocking socket operation
pub const MAX_IO_TIMEOUT_MS: u64 = 10_000;

/// Full autosplitter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutosplitterConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub livesplit: LiveSplitConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub classifiers: ClassifiersConfig,
    #[serde(default)]
    pub switch: SwitchConfig,
}

impl AutosplitterConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Device identifier handed to the backend
    #[serde(default = "default_device")]
    pub device: String,
    /// Sleep between polls when no frame is available
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Consecutive failed grabs before a handle counts as unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_device() -> String {
    "0".to_string()
}

fn default_frame_interval() -> u64 {
    33 // ~30 FPS
}

fn default_failure_threshold() -> u32 {
    30
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            frame_interval_ms: default_frame_interval(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// LiveSplit server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSplitConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval of the connection monitor
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,
    /// Minimum spacing of time/phase queries
    #[serde(default = "default_read_interval")]
    pub read_interval_ms: u64,
    /// Timeout of the reachability probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Read/write timeout of the command stream
    #[serde(default = "default_io_timeout")]
    pub io_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    crate::livesplit::DEFAULT_PORT
}

fn default_check_interval() -> u64 {
    1000
}

fn default_read_interval() -> u64 {
    200
}

fn default_probe_timeout() -> u64 {
    100
}

fn default_io_timeout() -> u64 {
    1000
}

impl Default for LiveSplitConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            check_interval_ms: default_check_interval(),
            read_interval_ms: default_read_interval(),
            probe_timeout_ms: default_probe_timeout(),
            io_timeout_ms: default_io_timeout(),
        }
    }
}

impl LiveSplitConfig {
    /// Config pointing at a local server on `port`
    pub fn local(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.clamp(1, MAX_IO_TIMEOUT_MS))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms.clamp(1, MAX_IO_TIMEOUT_MS))
    }
}

/// Load detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum spacing of two accepted detections
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// Consecutive same-direction votes before a classifier flips
    #[serde(default = "default_threshold")]
    pub hysteresis_threshold: u32,
    /// Classifier counters restart after this long without an update
    #[serde(default = "default_idle_reset")]
    pub idle_reset_ms: u64,
    /// Load-free frames required before game time resumes
    #[serde(default = "default_resume_frames")]
    pub resume_after_frames: u32,
}

fn default_cooldown() -> u64 {
    2000
}

fn default_threshold() -> u32 {
    5
}

fn default_idle_reset() -> u64 {
    1000
}

fn default_resume_frames() -> u32 {
    10
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown(),
            hysteresis_threshold: default_threshold(),
            idle_reset_ms: default_idle_reset(),
            resume_after_frames: default_resume_frames(),
        }
    }
}

impl DetectionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn idle_reset(&self) -> Duration {
        Duration::from_millis(self.idle_reset_ms)
    }
}

/// Oracle behind one load classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "oracle", rename_all = "snake_case")]
pub enum OracleConfig {
    /// Load while the region's mean luma stays below `max_mean_luma`
    DarkFrame {
        #[serde(default = "default_dark_luma")]
        max_mean_luma: f32,
    },
    /// Load while the region is dark but carries a band of bright text
    TextOnBlack {
        #[serde(default = "default_banner_mean")]
        max_mean_luma: f32,
        #[serde(default = "default_text_luma")]
        text_luma: f32,
        #[serde(default = "default_min_text")]
        min_text_fraction: f32,
        #[serde(default = "default_max_text")]
        max_text_fraction: f32,
    },
    /// No model available
    Disabled,
}

fn default_dark_luma() -> f32 {
    20.0
}

fn default_banner_mean() -> f32 {
    60.0
}

fn default_text_luma() -> f32 {
    200.0
}

fn default_min_text() -> f32 {
    0.01
}

fn default_max_text() -> f32 {
    0.25
}

impl OracleConfig {
    pub fn dark_frame() -> Self {
        OracleConfig::DarkFrame {
            max_mean_luma: default_dark_luma(),
        }
    }

    pub fn text_on_black() -> Self {
        OracleConfig::TextOnBlack {
            max_mean_luma: default_banner_mean(),
            text_luma: default_text_luma(),
            min_text_fraction: default_min_text(),
            max_text_fraction: default_max_text(),
        }
    }
}

/// Oracle selection per load type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiersConfig {
    #[serde(default = "OracleConfig::text_on_black")]
    pub banner_load: OracleConfig,
    #[serde(default = "OracleConfig::dark_frame")]
    pub regular_fade: OracleConfig,
    #[serde(default = "OracleConfig::dark_frame")]
    pub tower_castle: OracleConfig,
    #[serde(default = "OracleConfig::dark_frame")]
    pub ghost_house: OracleConfig,
}

impl Default for ClassifiersConfig {
    fn default() -> Self {
        Self {
            banner_load: OracleConfig::text_on_black(),
            regular_fade: OracleConfig::dark_frame(),
            tower_castle: OracleConfig::dark_frame(),
            ghost_house: OracleConfig::dark_frame(),
        }
    }
}

impl ClassifiersConfig {
    pub fn for_load_type(&self, load_type: LoadType) -> &OracleConfig {
        match load_type {
            LoadType::BannerLoad => &self.banner_load,
            LoadType::RegularFade => &self.regular_fade,
            LoadType::TowerCastle => &self.tower_castle,
            LoadType::GhostHouse => &self.ghost_house,
        }
    }
}

/// End-of-run switch detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Region of interest as (x1, y1, x2, y2), exclusive end
    #[serde(default = "default_switch_region")]
    pub region: (u32, u32, u32, u32),
    /// Per-channel tolerance around the reference colours
    #[serde(default = "default_switch_tolerance")]
    pub tolerance: u8,
    /// Fraction of the region that must match
    #[serde(default = "default_switch_fraction")]
    pub min_match_fraction: f32,
}

fn default_switch_region() -> (u32, u32, u32, u32) {
    (494, 278, 582, 296)
}

fn default_switch_tolerance() -> u8 {
    10
}

fn default_switch_fraction() -> f32 {
    0.6
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            region: default_switch_region(),
            tolerance: default_switch_tolerance(),
            min_match_fraction: default_switch_fraction(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AutosplitterConfig::from_toml("").unwrap();
        assert_eq!(config, AutosplitterConfig::default());
        assert_eq!(config.livesplit.port, 16834);
        assert_eq!(config.detection.cooldown(), Duration::from_secs(2));
        assert_eq!(config.detection.hysteresis_threshold, 5);
        assert_eq!(config.detection.resume_after_frames, 10);
    }

    #[test]
    fn test_partial_sections() {
        let config = AutosplitterConfig::from_toml(
            r#"
            [livesplit]
            port = 17000
            io_timeout_ms = 60000

            [classifiers.ghost_house]
            oracle = "disabled"

            [classifiers.regular_fade]
            oracle = "dark_frame"
            max_mean_luma = 35.0
            "#,
        )
        .unwrap();

        assert_eq!(config.livesplit.port, 17000);
        assert_eq!(config.livesplit.host, "127.0.0.1");
        assert_eq!(config.livesplit.io_timeout(), Duration::from_millis(MAX_IO_TIMEOUT_MS));
        assert_eq!(config.classifiers.ghost_house, OracleConfig::Disabled);
        assert_eq!(
            config.classifiers.regular_fade,
            OracleConfig::DarkFrame { max_mean_luma: 35.0 }
        );
        assert_eq!(config.classifiers.banner_load, OracleConfig::text_on_black());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(AutosplitterConfig::from_toml("[livesplit\nport = 1").is_err());
    }
}
