pub mod surface;

pub use surface::{FrameBuffer, FrameSurface, PngFileSurface};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, RgbImage};
use thiserror::Error;
use tokio::time::{Duration, Instant};

// Paint logging is per frame; keep it quiet unless debugging the viewer.
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Minimum spacing between accepted paints (~60 Hz).
pub const FRAME_BUDGET: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a base64 data URL")]
    NotADataUrl,
    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("frame image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
    #[error("frame decoder worker failed: {0}")]
    Worker(String),
    #[error("display surface error: {0}")]
    Surface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOutcome {
    Painted,
    /// Dropped because it arrived inside the frame budget.
    Throttled,
}

pub struct FrameRenderer {
    surface: Box<dyn FrameSurface>,
    budget: Duration,
    last_paint: Option<Instant>,
}

impl FrameRenderer {
    pub fn new(surface: Box<dyn FrameSurface>) -> Self {
        Self {
            surface,
            budget: FRAME_BUDGET,
            last_paint: None,
        }
    }

    pub async fn paint(&mut self, data_url: &str) -> Result<PaintOutcome, FrameError> {
        let now = Instant::now();
        if let Some(last) = self.last_paint {
            if now.duration_since(last) < self.budget {
                log_debug!("frame dropped, {:?} since last paint", now.duration_since(last));
                return Ok(PaintOutcome::Throttled);
            }
        }

        let bytes = decode_data_url(data_url)?;
        let (width, height) = self.surface.size();
        let frame = tokio::task::spawn_blocking(move || -> Result<RgbImage, FrameError> {
            let image = image::load_from_memory(&bytes)?;
            Ok(image
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgb8())
        })
        .await
        .map_err(|err| FrameError::Worker(err.to_string()))??;

        self.surface.draw(&frame)?;
        self.last_paint = Some(now);
        log_debug!("frame painted at {width}x{height}");
        Ok(PaintOutcome::Painted)
    }

    pub fn clear(&mut self) {
        self.surface.clear();
        self.last_paint = None;
    }
}

/// Extracts the payload of a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, FrameError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(FrameError::NotADataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(FrameError::NotADataUrl)?;
    if !header.ends_with(";base64") {
        return Err(FrameError::NotADataUrl);
    }
    Ok(STANDARD.decode(payload.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_data_url(color: [u8; 3]) -> String {
        let image = RgbImage::from_pixel(8, 8, Rgb(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn rejects_non_data_urls() {
        assert!(matches!(
            decode_data_url("http://example.com/a.jpg"),
            Err(FrameError::NotADataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg,plain"),
            Err(FrameError::NotADataUrl)
        ));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,@@@"),
            Err(FrameError::Base64(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn paints_and_scales_to_surface() {
        let buffer = FrameBuffer::new(32, 18);
        let mut renderer = FrameRenderer::new(Box::new(buffer.clone()));

        let outcome = renderer.paint(&png_data_url([200, 10, 10])).await.unwrap();

        assert_eq!(outcome, PaintOutcome::Painted);
        let frame = buffer.latest().unwrap();
        assert_eq!(frame.dimensions(), (32, 18));
        let Rgb([r, g, b]) = *frame.get_pixel(16, 9);
        assert!(r.abs_diff(200) <= 1 && g.abs_diff(10) <= 1 && b.abs_diff(10) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drops_frames_inside_budget() {
        let buffer = FrameBuffer::default();
        let mut renderer = FrameRenderer::new(Box::new(buffer.clone()));
        let frame = png_data_url([0, 0, 0]);

        assert_eq!(renderer.paint(&frame).await.unwrap(), PaintOutcome::Painted);
        tokio::time::advance(Duration::from_millis(5)).await;
        assert_eq!(renderer.paint(&frame).await.unwrap(), PaintOutcome::Throttled);
        tokio::time::advance(Duration::from_millis(12)).await;
        assert_eq!(renderer.paint(&frame).await.unwrap(), PaintOutcome::Painted);
    }

    #[tokio::test]
    async fn broken_image_fails_alone() {
        let buffer = FrameBuffer::default();
        let mut renderer = FrameRenderer::new(Box::new(buffer.clone()));
        let garbage = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"not an image"));

        assert!(matches!(
            renderer.paint(&garbage).await,
            Err(FrameError::Decode(_))
        ));
        assert!(buffer.latest().is_none());
        assert_eq!(
            renderer.paint(&png_data_url([1, 2, 3])).await.unwrap(),
            PaintOutcome::Painted
        );
    }

    #[tokio::test]
    async fn clear_empties_the_surface() {
        let buffer = FrameBuffer::default();
        let mut renderer = FrameRenderer::new(Box::new(buffer.clone()));
        renderer.paint(&png_data_url([9, 9, 9])).await.unwrap();

        renderer.clear();

        assert!(buffer.latest().is_none());
    }
}
