//! Synthetic `stub://` frame source.
//!
//! Produces a moving gradient so the overlay and the label requests have
//! something non-uniform to work with. With a frame limit the stream ends
//! after that many frames; without one it runs forever.

use super::{CaptureError, FrameSource};
use crate::frame::{expected_len, Frame, FrameError, CHANNELS};

pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    limit: Option<u64>,
    frame_count: u64,
    released: bool,
}

impl SyntheticSource {
    pub fn new(name: &str, width: u32, height: u32, limit: Option<u64>) -> Self {
        log::info!("SyntheticSource: connected to stub://{name} ({width}x{height})");
        Self {
            name: format!("stub://{name}"),
            width,
            height,
            limit,
            frame_count: 0,
            released: false,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&self) -> Result<Vec<u8>, FrameError> {
        let len = expected_len(self.width, self.height)?;
        let width = self.width as usize;
        let height = self.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = vec![0u8; len];
        for (i, px) in pixels.chunks_exact_mut(CHANNELS).enumerate() {
            let x = i % width;
            let y = i / width;
            px[0] = ((x + shift) * 255 / width.max(1)) as u8;
            px[1] = (y * 255 / height.max(1)) as u8;
            px[2] = ((x + y + shift.wrapping_mul(3)) % 256) as u8;
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.released {
            return Err(CaptureError::Disconnected {
                device: self.name.clone(),
                source: anyhow::anyhow!("source already released"),
            });
        }
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.frame_count += 1;
        self.generate_pixels()
            .and_then(|pixels| Frame::from_rgb(pixels, self.width, self.height, self.frame_count))
            .map(Some)
            .map_err(|source| CaptureError::InvalidFrame {
                device: self.name.clone(),
                source,
            })
    }

    fn release(&mut self) {
        if !self.released {
            log::info!("Releasing camera resource {}...", self.name);
            self.released = true;
        }
    }
}
