//! Display surfaces and the shared exit signal.
//!
//! A surface shows composed frames and reports when the user asked to quit.
//! `window` (feature `display-window`) opens a desktop window; `headless`
//! only logs what would have been drawn.

#[cfg(feature = "display-window")]
mod window;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::DisplayMode;
use crate::overlay::Composition;

#[cfg(feature = "display-window")]
pub use window::WindowDisplay;

pub const WINDOW_TITLE: &str = "Live Labels";

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to open display window: {0}")]
    Open(String),
    #[error("failed to update display window: {0}")]
    Update(String),
    #[error("display mode '{0}' is not available in this build")]
    Unsupported(&'static str),
}

pub trait DisplaySurface {
    fn present(&mut self, composition: &Composition) -> Result<(), DisplayError>;

    /// Whether the user asked to stop through this surface.
    fn exit_requested(&mut self) -> bool;

    /// Tear down the surface. Further calls are no-ops.
    fn close(&mut self) {}
}

impl<T: DisplaySurface + ?Sized> DisplaySurface for Box<T> {
    fn present(&mut self, composition: &Composition) -> Result<(), DisplayError> {
        (**self).present(composition)
    }

    fn exit_requested(&mut self) -> bool {
        (**self).exit_requested()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Surface for runs without a screen. Captions go to the debug log.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    presented: u64,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn present(&mut self, composition: &Composition) -> Result<(), DisplayError> {
        self.presented += 1;
        for annotation in &composition.annotations {
            log::debug!("label: {}", annotation.caption);
        }
        Ok(())
    }

    fn exit_requested(&mut self) -> bool {
        false
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            log::debug!("headless display closed after {} frames", self.presented);
        }
    }
}

/// Process-wide "please stop" flag, set from the Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct ExitSignal(Arc<AtomicBool>);

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that trips on Ctrl-C / SIGTERM.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let signal = Self::new();
        let handle = signal.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupt received, stopping after the current frame");
            handle.trigger();
        })?;
        Ok(signal)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn open_display(mode: DisplayMode) -> Result<Box<dyn DisplaySurface>, DisplayError> {
    match mode {
        DisplayMode::Headless => {
            log::info!("Running headless; overlays are not shown.");
            Ok(Box::new(HeadlessDisplay::new()))
        }
        #[cfg(feature = "display-window")]
        DisplayMode::Window => Ok(Box::new(WindowDisplay::new(WINDOW_TITLE))),
        #[cfg(not(feature = "display-window"))]
        DisplayMode::Window => Err(DisplayError::Unsupported("window")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::labels::{Label, LabelResult};
    use crate::overlay::compose;

    #[test]
    fn exit_signal_is_shared_between_clones() {
        let signal = ExitSignal::new();
        let other = signal.clone();
        assert!(!signal.is_triggered());
        other.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn headless_counts_presented_frames() -> Result<(), DisplayError> {
        let frame = Frame::from_rgb(vec![0u8; 4 * 4 * 3], 4, 4, 0).expect("frame");
        let labels = LabelResult::new(vec![Label::new("Cat", 91.0)]);
        let mut display = HeadlessDisplay::new();
        display.present(&compose(&frame, &labels))?;
        display.present(&compose(&frame, &LabelResult::empty()))?;
        assert_eq!(display.frames_presented(), 2);
        assert!(!display.exit_requested());
        display.close();
        display.close();
        Ok(())
    }

    #[test]
    fn headless_mode_opens_without_a_screen() {
        assert!(open_display(DisplayMode::Headless).is_ok());
    }

    #[cfg(not(feature = "display-window"))]
    #[test]
    fn window_mode_requires_feature() {
        assert!(matches!(
            open_display(DisplayMode::Window),
            Err(DisplayError::Unsupported("window"))
        ));
    }
}
