//! V4L2 frame source.
//!
//! Opens a local device node (e.g. /dev/video0), accepts whatever format the
//! device is currently configured for and normalizes each buffer to RGB8.
//! No format negotiation is attempted.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::path::Path;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CaptureError, FrameSource};
use crate::frame::Frame;

const STREAM_BUFFERS: u32 = 4;

pub struct V4l2Source {
    device: String,
    state: Option<DeviceState>,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        Self::connect(path).map_err(|source| CaptureError::Open {
            device: path.display().to_string(),
            source,
        })
    }

    fn connect(path: &Path) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let name = path.display().to_string();
        let handle =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {name}"))?;
        let format = handle.format().context("read v4l2 format")?;
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "unsupported default pixel format {} on {}",
                format.fourcc,
                name
            )
        })?;

        let state = DeviceStateBuilder {
            device: handle,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Source: connected to {} ({}x{} {})",
            name,
            format.width,
            format.height,
            format.fourcc
        );
        Ok(Self {
            device: name,
            state: Some(state),
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }

    fn capture(&mut self) -> Result<(Vec<u8>, u32, u32)> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device released")?;
        let buffer = state
            .with_mut(|fields| {
                fields.stream.next().map(|(buf, meta)| {
                    let used = (meta.bytesused as usize).min(buf.len());
                    let used = if used == 0 { buf.len() } else { used };
                    buf[..used].to_vec()
                })
            })
            .context("capture v4l2 frame")?;
        normalize_to_rgb(&buffer, self.width, self.height, self.format)
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> &str {
        &self.device
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let (rgb, width, height) = self
            .capture()
            .map_err(|source| CaptureError::Disconnected {
                device: self.device.clone(),
                source,
            })?;
        self.frame_count += 1;

        Frame::from_rgb(rgb, width, height, self.frame_count)
            .map(Some)
            .map_err(|source| CaptureError::InvalidFrame {
                device: self.device.clone(),
                source,
            })
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("Releasing camera resource {}...", self.device);
        }
    }
}
