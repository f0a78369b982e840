//! Captured frames.
//!
//! A `Frame` is a packed RGB8 bitmap owned by exactly one loop iteration. It is
//! created by a frame source, lent to the label client and the renderer, and
//! dropped when the iteration ends.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;

/// Bytes per pixel of every frame (RGB8).
pub const CHANNELS: usize = 3;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame dimensions {width}x{height} are empty or overflow")]
    BadDimensions { width: u32, height: u32 },
    #[error("RGB frame length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// 1-based capture counter of the producing source.
    sequence: u64,
}

impl Frame {
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Result<Self, FrameError> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy of the pixels as an image buffer the overlay can draw on.
    pub fn to_image(&self) -> RgbImage {
        // Length was validated at construction, so `from_raw` cannot fail here.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Compress the frame into the JPEG bytes the labeling API expects.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let mut buffer = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode(
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .filter(|len| *len > 0)
        .ok_or(FrameError::BadDimensions { width, height })
}
