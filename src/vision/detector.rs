//! Classification oracles and the end-of-run switch detector

use super::capture::Frame;
use super::preprocess::Features;
use crate::config::{OracleConfig, SwitchConfig};

/// Class index an oracle returns for "load in progress"
pub const LOAD_CLASS: usize = 1;

/// Opaque classifier over preprocessed features.
///
/// Returns the winning class index, or `None` if inference failed.
pub trait Oracle: Send {
    fn predict(&mut self, features: &Features) -> Option<usize>;
}

/// Votes "load" while the region is close to black
#[derive(Debug, Clone)]
pub struct DarkFrameOracle {
    pub max_mean_luma: f32,
}

impl Oracle for DarkFrameOracle {
    fn predict(&mut self, features: &Features) -> Option<usize> {
        if features.luma.is_empty() {
            return None;
        }
        Some(if features.mean() < self.max_mean_luma {
            LOAD_CLASS
        } else {
            0
        })
    }
}

/// Votes "load" for a dark region carrying some bright text
#[derive(Debug, Clone)]
pub struct TextOnBlackOracle {
    pub max_mean_luma: f32,
    pub text_luma: f32,
    pub min_text_fraction: f32,
    pub max_text_fraction: f32,
}

impl Oracle for TextOnBlackOracle {
    fn predict(&mut self, features: &Features) -> Option<usize> {
        if features.luma.is_empty() {
            return None;
        }
        let text = features.fraction_above(self.text_luma);
        let is_banner = features.mean() < self.max_mean_luma
            && text >= self.min_text_fraction
            && text <= self.max_text_fraction;
        Some(if is_banner { LOAD_CLASS } else { 0 })
    }
}

/// Build the oracle described by `config`; `None` means no model is available
pub fn oracle_from_config(config: &OracleConfig) -> Option<Box<dyn Oracle>> {
    match *config {
        OracleConfig::DarkFrame { max_mean_luma } => Some(Box::new(DarkFrameOracle { max_mean_luma })),
        OracleConfig::TextOnBlack {
            max_mean_luma,
            text_luma,
            min_text_fraction,
            max_text_fraction,
        } => Some(Box::new(TextOnBlackOracle {
            max_mean_luma,
            text_luma,
            min_text_fraction,
            max_text_fraction,
        })),
        OracleConfig::Disabled => None,
    }
}

/// Reference colours of the switch sprite
const SWITCH_WHITE: [u8; 3] = [245, 245, 243];
const SWITCH_PALE_BLUE: [u8; 3] = [235, 239, 239];
const SWITCH_LIGHT_CYAN: [u8; 3] = [216, 231, 232];

/// Detects the end-of-level switch by pixel colour in a fixed region
#[derive(Debug, Clone)]
pub struct SwitchDetector {
    /// (x1, y1, x2, y2), exclusive end
    region: (u32, u32, u32, u32),
    tolerance: u8,
    min_match_fraction: f32,
    detected: bool,
    checked: bool,
}

impl SwitchDetector {
    pub fn new(config: &SwitchConfig) -> Self {
        Self {
            region: config.region,
            tolerance: config.tolerance,
            min_match_fraction: config.min_match_fraction,
            detected: false,
            checked: false,
        }
    }

    /// Check if a pixel is within `tolerance` of `expected` on every channel
    pub fn check_pixel(pixel: [u8; 3], expected: [u8; 3], tolerance: u8) -> bool {
        pixel
            .iter()
            .zip(expected.iter())
            .all(|(&p, &e)| (p as i16 - e as i16).abs() <= tolerance as i16)
    }

    fn is_switch_pixel(&self, pixel: [u8; 3]) -> bool {
        let near_white = pixel
            .iter()
            .zip(SWITCH_WHITE.iter())
            .all(|(&p, &w)| p as i16 >= w as i16 - self.tolerance as i16);

        near_white
            || Self::check_pixel(pixel, SWITCH_PALE_BLUE, self.tolerance)
            || Self::check_pixel(pixel, SWITCH_LIGHT_CYAN, self.tolerance)
    }

    /// Evaluate one frame; returns whether the switch is visible
    pub fn update(&mut self, frame: &Frame) -> bool {
        let (x1, y1, x2, y2) = self.region;
        let x2 = x2.min(frame.width());
        let y2 = y2.min(frame.height());

        if x1 >= x2 || y1 >= y2 {
            self.detected = false;
            return false;
        }

        let mut matching = 0u32;
        for y in y1..y2 {
            for x in x1..x2 {
                if let Some(pixel) = frame.get_pixel(x, y) {
                    if self.is_switch_pixel(pixel) {
                        matching += 1;
                    }
                }
            }
        }

        let total = (x2 - x1) * (y2 - y1);
        self.detected = matching as f32 > total as f32 * self.min_match_fraction;
        self.detected
    }

    /// True once per run, the first time the switch is seen
    pub fn check_switch_hit(&mut self) -> bool {
        if self.detected && !self.checked {
            self.checked = true;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.detected = false;
        self.checked = false;
    }
}
