use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::RgbImage;

use super::FrameError;

/// Where decoded frames end up.
pub trait FrameSurface: Send {
    fn size(&self) -> (u32, u32);
    fn draw(&mut self, frame: &RgbImage) -> Result<(), FrameError>;
    fn clear(&mut self);
}

/// Default display size, matching the analysis service's preview resolution.
pub const DEFAULT_SURFACE_SIZE: (u32, u32) = (320, 180);

/// In-memory surface. Clones share the same backing frame, so a viewer can hold
/// one while the session paints into another.
#[derive(Clone)]
pub struct FrameBuffer {
    size: (u32, u32),
    latest: Arc<Mutex<Option<RgbImage>>>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn latest(&self) -> Option<RgbImage> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SURFACE_SIZE.0, DEFAULT_SURFACE_SIZE.1)
    }
}

impl FrameSurface for FrameBuffer {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, frame: &RgbImage) -> Result<(), FrameError> {
        let mut guard = self
            .latest
            .lock()
            .map_err(|_| FrameError::Surface("frame buffer lock poisoned".into()))?;
        *guard = Some(frame.clone());
        Ok(())
    }

    fn clear(&mut self) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = None;
        }
    }
}

/// Writes the most recent frame to a PNG file, overwriting it each paint.
pub struct PngFileSurface {
    path: PathBuf,
    size: (u32, u32),
}

impl PngFileSurface {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            size: DEFAULT_SURFACE_SIZE,
        }
    }
}

impl FrameSurface for PngFileSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, frame: &RgbImage) -> Result<(), FrameError> {
        frame
            .save_with_format(&self.path, image::ImageFormat::Png)
            .map_err(|err| FrameError::Surface(format!("{}: {err}", self.path.display())))
    }

    fn clear(&mut self) {
        if self.path.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                log::warn!("could not clear frame file {}: {err}", self.path.display());
            }
        }
    }
}
