//! Frame to feature transforms fed to the classification oracles

use image::imageops::{self, FilterType};

use super::capture::{Frame, FRAME_HEIGHT, FRAME_WIDTH};
use crate::route::LoadType;

/// Grayscale luma samples of a downscaled region
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<f32>,
}

impl Features {
    /// Mean luma, 0.0 for an empty vector
    pub fn mean(&self) -> f32 {
        if self.luma.is_empty() {
            return 0.0;
        }
        self.luma.iter().sum::<f32>() / self.luma.len() as f32
    }

    /// Fraction of samples brighter than `threshold`
    pub fn fraction_above(&self, threshold: f32) -> f32 {
        if self.luma.is_empty() {
            return 0.0;
        }
        let bright = self.luma.iter().filter(|&&v| v > threshold).count();
        bright as f32 / self.luma.len() as f32
    }
}

/// Deterministic frame to feature transform
pub trait Preprocessor: Send {
    fn preprocess(&self, frame: &Frame) -> Features;
}

/// Crop, downscale, convert to luma, optionally gamma-correct
#[derive(Debug, Clone)]
pub struct RegionPreprocessor {
    /// (x, y, width, height) in frame coordinates
    region: (u32, u32, u32, u32),
    output: (u32, u32),
    gamma: f32,
}

impl RegionPreprocessor {
    pub fn new(region: (u32, u32, u32, u32), output: (u32, u32)) -> Self {
        Self {
            region,
            output: (output.0.max(1), output.1.max(1)),
            gamma: 1.0,
        }
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Level banner: horizontal band through the middle of the screen
    pub fn banner() -> Self {
        Self::new((0, 160, FRAME_WIDTH, 160), (128, 32))
    }

    /// Regular fade: the whole frame
    pub fn regular_fade() -> Self {
        Self::new((0, 0, FRAME_WIDTH, FRAME_HEIGHT), (64, 48))
    }

    /// Tower/castle fade: the iris closes on the centre
    pub fn tower_castle() -> Self {
        Self::new((270, 190, 100, 100), (50, 50))
    }

    /// Ghost house fade: whole frame, shadows lifted
    pub fn ghost_house() -> Self {
        Self::regular_fade().with_gamma(0.8)
    }

    pub fn for_load_type(load_type: LoadType) -> Self {
        match load_type {
            LoadType::BannerLoad => Self::banner(),
            LoadType::RegularFade => Self::regular_fade(),
            LoadType::TowerCastle => Self::tower_castle(),
            LoadType::GhostHouse => Self::ghost_house(),
        }
    }
}

impl Preprocessor for RegionPreprocessor {
    fn preprocess(&self, frame: &Frame) -> Features {
        let (x, y, w, h) = self.region;
        let cropped = imageops::crop_imm(frame.image(), x, y, w, h).to_image();
        let scaled = imageops::resize(&cropped, self.output.0, self.output.1, FilterType::Triangle);
        let gray = imageops::grayscale(&scaled);

        let luma = gray
            .pixels()
            .map(|p| {
                let v = p.0[0] as f32;
                if (self.gamma - 1.0).abs() < f32::EPSILON {
                    v
                } else {
                    255.0 * (v / 255.0).powf(self.gamma)
                }
            })
            .collect();

        Features {
            width: gray.width(),
            height: gray.height(),
            luma,
        }
    }
}
