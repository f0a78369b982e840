use std::fmt;

use thiserror::Error;

use crate::config::Config;
use crate::frame::Frame;

use super::result::LabelResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Timeouts, throttling, temporary network failures.
    Transient,
    /// Rejected credentials, malformed requests, unsupported input.
    Permanent,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErrorKind::Transient => f.write_str("transient"),
            ServiceErrorKind::Permanent => f.write_str("permanent"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{kind} label service error{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct ServiceError {
    kind: ServiceErrorKind,
    code: Option<String>,
    message: String,
}

impl ServiceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Transient,
            code: None,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Permanent,
            code: None,
            message: message.into(),
        }
    }

    /// Attach the service's error code (e.g. `ThrottlingException`).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn kind(&self) -> ServiceErrorKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ServiceErrorKind::Transient
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Remote labeling seam.
///
/// Calls are synchronous and may block for a network round-trip. The main loop
/// only depends on this trait, so a timeout-bounded or non-blocking client can
/// replace the default one without touching the loop.
pub trait LabelClient {
    /// Client identifier for logs.
    fn name(&self) -> &'static str;

    /// Request labels for one frame using the configured limits.
    fn detect(&mut self, frame: &Frame, config: &Config) -> Result<LabelResult, ServiceError>;
}

impl<T: LabelClient + ?Sized> LabelClient for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame, config: &Config) -> Result<LabelResult, ServiceError> {
        (**self).detect(frame, config)
    }
}
