//! Frame acquisition
//!
//! A [`CaptureDevice`] owns one [`DeviceBackend`] and turns its raw images into
//! normalized 640x480 [`Frame`]s. Grab failures never raise: they count toward
//! an unhealthy handle and yield `None` for that poll.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::{AutosplitterError, Result};

/// Canonical frame width
pub const FRAME_WIDTH: u32 = 640;
/// Canonical frame height
pub const FRAME_HEIGHT: u32 = 480;

/// An RGB frame at the canonical resolution
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an image, resizing it to 640x480 with bilinear filtering
    pub fn new(image: RgbImage) -> Self {
        let image = if image.dimensions() == (FRAME_WIDTH, FRAME_HEIGHT) {
            image
        } else {
            imageops::resize(&image, FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle)
        };
        Self { image }
    }

    /// Build from packed RGB bytes
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// A frame of a single colour
    pub fn filled(rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Get a pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }
}

/// Something that produces frames for the engine
pub trait FrameSource: Send {
    /// Open a device. Re-opening the current device is a no-op while healthy.
    fn open(&mut self, device_id: &str) -> Result<()>;

    /// Next frame, or `None` when nothing could be grabbed this poll
    fn next_frame(&mut self) -> Option<Frame>;

    /// Whether the current handle is still delivering frames
    fn is_healthy(&self) -> bool;

    /// Release the device
    fn release(&mut self);
}

/// Raw access to a capture device
pub trait DeviceBackend: Send {
    fn open(&mut self, device_id: &str) -> Result<()>;

    /// Grab one image; `None` on a transient failure
    fn grab(&mut self) -> Option<RgbImage>;

    fn release(&mut self);
}

/// Frame source over a backend, with failure tracking and normalization
pub struct CaptureDevice<B: DeviceBackend> {
    backend: B,
    device_id: Option<String>,
    consecutive_failures: u32,
    failure_threshold: u32,
    frames: u64,
}

impl<B: DeviceBackend> CaptureDevice<B> {
    pub fn new(backend: B, failure_threshold: u32) -> Self {
        Self {
            backend,
            device_id: None,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            frames: 0,
        }
    }

    /// Currently opened device id
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Frames delivered since the device was opened
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: DeviceBackend> FrameSource for CaptureDevice<B> {
    fn open(&mut self, device_id: &str) -> Result<()> {
        if self.device_id.as_deref() == Some(device_id) && self.is_healthy() {
            return Ok(());
        }

        self.release();
        self.backend.open(device_id)?;
        self.device_id = Some(device_id.to_string());
        self.consecutive_failures = 0;
        self.frames = 0;
        log::info!("Capture device '{}' opened", device_id);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.device_id.as_ref()?;

        match self.backend.grab() {
            Some(image) if image.width() > 0 && image.height() > 0 => {
                self.consecutive_failures = 0;
                self.frames += 1;
                Some(Frame::new(image))
            }
            _ => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures == self.failure_threshold {
                    log::warn!(
                        "Capture device '{}' stopped delivering frames",
                        self.device_id.as_deref().unwrap_or_default()
                    );
                }
                None
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.device_id.is_some() && self.consecutive_failures < self.failure_threshold
    }

    fn release(&mut self) {
        if let Some(id) = self.device_id.take() {
            self.backend.release();
            log::debug!("Capture device '{}' released", id);
        }
        self.consecutive_failures = 0;
    }
}

/// Replays a directory of images in lexical order.
///
/// The device id is the directory path.
pub struct FrameDirectory {
    files: Vec<PathBuf>,
    position: usize,
    looping: bool,
}

impl FrameDirectory {
    pub fn new(looping: bool) -> Self {
        Self {
            files: Vec::new(),
            position: 0,
            looping,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "png" | "jpg" | "jpeg" | "bmp"
                )
            })
            .unwrap_or(false)
    }
}

impl DeviceBackend for FrameDirectory {
    fn open(&mut self, device_id: &str) -> Result<()> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(device_id)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| Self::is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(AutosplitterError::Device(format!(
                "no frames found in {}",
                device_id
            )));
        }

        log::info!("Frame directory '{}': {} frames", device_id, files.len());
        self.files = files;
        self.position = 0;
        Ok(())
    }

    fn grab(&mut self) -> Option<RgbImage> {
        if self.position >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return None;
            }
            self.position = 0;
        }

        let path = &self.files[self.position];
        self.position += 1;

        match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                log::warn!("Failed to decode frame {}: {}", path.display(), e);
                None
            }
        }
    }

    fn release(&mut self) {
        self.files.clear();
        self.position = 0;
    }
}

/// Backend fed by another thread, e.g. a camera driver in the host application
pub struct ChannelBackend {
    rx: Receiver<RgbImage>,
    disconnected: bool,
}

impl ChannelBackend {
    /// Create the backend and the sender that feeds it
    pub fn new(capacity: usize) -> (Self, Sender<RgbImage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                rx,
                disconnected: false,
            },
            tx,
        )
    }
}

impl DeviceBackend for ChannelBackend {
    fn open(&mut self, _device_id: &str) -> Result<()> {
        if self.disconnected {
            return Err(AutosplitterError::Device("frame feed closed".to_string()));
        }
        Ok(())
    }

    fn grab(&mut self) -> Option<RgbImage> {
        match self.rx.try_recv() {
            Ok(image) => Some(image),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.disconnected {
                    log::warn!("Frame feed disconnected");
                    self.disconnected = true;
                }
                None
            }
        }
    }

    fn release(&mut self) {}
}
