//! RGB frame buffers and frame loading

use crate::error::{PipelineError, Result};

/// A decoded frame: interleaved `R,G,B` bytes, row-major.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize) * 3);
        Self {
            width,
            height,
            data,
        }
    }

    /// BT.601 integer luma at pixel `(x, y)`.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 3;
        let r = self.data[idx] as u32;
        let g = self.data[idx + 1] as u32;
        let b = self.data[idx + 2] as u32;
        ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
    }
}

/// Source of decoded frames, keyed by image path.
///
/// A trait so tests can feed synthetic frames without touching the
/// filesystem; production uses [`ImageFileLoader`].
pub trait FrameLoader {
    fn load(&self, path: &str) -> Result<RgbFrame>;
}

/// Loads frames from image files via the `image` crate.
#[derive(Debug, Default)]
pub struct ImageFileLoader;

impl FrameLoader for ImageFileLoader {
    fn load(&self, path: &str) -> Result<RgbFrame> {
        let img = image::open(path)
            .map_err(|e| PipelineError::ImageLoad(format!("{path}: {e}")))?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(RgbFrame::new(width, height, rgb.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_channels() {
        // 1x2 frame: pure white then pure black.
        let frame = RgbFrame::new(1, 2, vec![255, 255, 255, 0, 0, 0]);
        assert_eq!(frame.luma(0, 0), 255);
        assert_eq!(frame.luma(0, 1), 0);
    }

    #[test]
    fn test_missing_file_is_image_load_error() {
        let loader = ImageFileLoader;
        let err = loader.load("/nonexistent/frame.png").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
