//! Live Labels
//!
//! Captures frames from a camera, asks AWS Rekognition what is in each one,
//! and shows the frame with the detected labels drawn on top.
//!
//! # Module Structure
//!
//! - `config`: Startup configuration (environment, `.env`, optional JSON file)
//! - `ingest`: Frame sources (V4L2 devices, synthetic `stub://` cameras)
//! - `frame`: RGB frames and JPEG encoding
//! - `labels`: Label client trait, Rekognition client, SigV4 signing
//! - `overlay`: Caption/box composition and the renderer
//! - `display`: Window and headless surfaces, exit signal
//! - `pipeline`: The capture → label → render loop
//! - `logging`: Console and file logging

pub mod config;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod logging;
pub mod overlay;
pub mod pipeline;

pub use config::{CameraSpec, Config, ConfigError, Credentials, DisplayMode, Environment};
pub use display::{DisplayError, DisplaySurface, ExitSignal, HeadlessDisplay};
pub use frame::{Frame, FrameError};
pub use ingest::{CaptureError, FrameSource, SyntheticSource};
pub use labels::{
    BoundingBox, Label, LabelClient, LabelResult, RekognitionClient, ServiceError,
    ServiceErrorKind,
};
pub use overlay::{compose, Composition, Renderer};
pub use pipeline::{FatalError, LoopState, LoopStats, Pipeline, RunReport, StopReason};
