//! Label detection.
//!
//! A [`LabelClient`] turns a frame into a [`LabelResult`]. The production
//! client talks to AWS Rekognition; tests plug in scripted clients. Every
//! failure is classified as transient (skip this frame's overlay) or
//! permanent (stop the loop).

mod client;
pub mod rekognition;
mod result;
pub(crate) mod sigv4;

pub use client::{LabelClient, ServiceError, ServiceErrorKind};
pub use rekognition::RekognitionClient;
pub use result::{BoundingBox, Label, LabelResult};
