//! Camera frame container.
//!
//! `RgbFrame` is the only image type the pipeline accepts. Construction validates
//! dimensions and buffer length so later stages never see an empty or torn frame.

use image::{DynamicImage, RgbImage};
use std::time::{Duration, Instant};

use crate::error::{PipelineError, PipelineResult};

/// Largest frame edge accepted from a source (8K).
pub const MAX_FRAME_EDGE: u32 = 7680;

// ----------------------------------------------------------------------------
// RgbFrame
// ----------------------------------------------------------------------------

/// Packed 8-bit RGB frame plus its capture instant.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    image: RgbImage,
    captured_at: Instant,
}

impl RgbFrame {
    /// Wrap a packed RGB24 buffer.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> PipelineResult<Self> {
        check_dimensions(width, height)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| PipelineError::invalid_input("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(PipelineError::invalid_input(format!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| PipelineError::invalid_input("RGB buffer rejected"))?;
        Ok(Self::from_rgb_image(image))
    }

    /// Convert any decoded image into an RGB frame.
    pub fn from_image(image: DynamicImage) -> PipelineResult<Self> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self::from_rgb_image(image.to_rgb8()))
    }

    fn from_rgb_image(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Time since the frame was handed to the pipeline.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

fn check_dimensions(width: u32, height: u32) -> PipelineResult<()> {
    if width == 0 || height == 0 {
        return Err(PipelineError::invalid_input(format!(
            "empty frame ({}x{})",
            width, height
        )));
    }
    if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
        return Err(PipelineError::invalid_input(format!(
            "frame {}x{} exceeds maximum edge {}",
            width, height, MAX_FRAME_EDGE
        )));
    }
    Ok(())
}
