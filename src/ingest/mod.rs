//! Frame ingestion sources.
//!
//! - Synthetic `stub://` source (testing, demos, headless CI)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Sources hand out owned `Frame`s one at a time. A source either yields a
//! frame, reports the end of its stream, or fails with a `CaptureError`. The
//! main loop treats capture failures as fatal: without a frame there is
//! nothing left to do.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use thiserror::Error;

use crate::config::CameraSpec;
use crate::frame::{Frame, FrameError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open camera {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("camera {device} stopped delivering frames: {source}")]
    Disconnected {
        device: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("camera {device} produced an invalid frame: {source}")]
    InvalidFrame {
        device: String,
        #[source]
        source: FrameError,
    },
    #[error("camera {device} is not supported by this build: {reason}")]
    Unsupported { device: String, reason: String },
}

/// A camera-like producer of frames.
pub trait FrameSource {
    /// Human-readable identifier (device path or stub URL).
    fn describe(&self) -> &str;

    /// Block until the next frame is available.
    ///
    /// `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the underlying device. Further calls to `next_frame` fail.
    fn release(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn describe(&self) -> &str {
        (**self).describe()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Open the source named by the camera setting.
pub fn open_source(camera: &CameraSpec) -> Result<Box<dyn FrameSource>, CaptureError> {
    log::info!("Attempting to open camera {}...", camera.describe());
    let source: Box<dyn FrameSource> = match camera {
        CameraSpec::Synthetic {
            name,
            frames,
            width,
            height,
        } => Box::new(SyntheticSource::new(name, *width, *height, *frames)),
        CameraSpec::Device(path) => open_device(path)?,
    };
    log::info!("Camera {} opened successfully.", source.describe());
    Ok(source)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(path: &std::path::Path) -> Result<Box<dyn FrameSource>, CaptureError> {
    Ok(Box::new(V4l2Source::open(path)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(path: &std::path::Path) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported {
        device: path.display().to_string(),
        reason: "rebuild with the `ingest-v4l2` feature or use a stub:// camera".to_string(),
    })
}
