//! The capture → label → render loop.
//!
//! One thread, one frame at a time: capture, request labels, draw, check for
//! exit. Lifecycle: `Init → Running → Draining → Terminated`.
//!
//! - A transient label failure shows the frame unlabeled and keeps running.
//! - A permanent label failure, a capture failure, or a display failure
//!   drains the loop and ends with a non-zero exit code.
//! - An exit request (key, window close, Ctrl-C) drains with exit code 0.

use std::ops::ControlFlow;

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::display::{open_display, DisplayError, DisplaySurface, ExitSignal};
use crate::ingest::{open_source, CaptureError, FrameSource};
use crate::labels::{LabelClient, LabelResult, RekognitionClient, ServiceError};
use crate::overlay::Renderer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

impl FatalError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Config(_) => 2,
            FatalError::Capture(_) | FatalError::Service(_) | FatalError::Display(_) => 1,
        }
    }
}

#[derive(Debug)]
pub enum StopReason {
    /// The user asked to quit.
    ExitRequested,
    /// The frame source has no more frames.
    EndOfStream,
    Fatal(FatalError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames captured and shown.
    pub iterations: u64,
    /// Frames shown with labels from a successful request.
    pub labeled_frames: u64,
    /// Frames shown unlabeled after a transient service failure.
    pub transient_failures: u64,
}

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub reason: StopReason,
    pub stats: LoopStats,
    pub state: LoopState,
}

impl RunReport {
    fn failed_at_init(err: FatalError) -> Self {
        Self {
            reason: StopReason::Fatal(err),
            stats: LoopStats::default(),
            state: LoopState::Terminated,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match &self.reason {
            StopReason::ExitRequested | StopReason::EndOfStream => 0,
            StopReason::Fatal(err) => err.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

pub struct Pipeline<'cfg, S, C, D> {
    config: &'cfg Config,
    source: S,
    client: C,
    renderer: Renderer<D>,
    state: LoopState,
    stats: LoopStats,
}

impl<'cfg, S, C, D> Pipeline<'cfg, S, C, D>
where
    S: FrameSource,
    C: LabelClient,
    D: DisplaySurface,
{
    pub fn new(config: &'cfg Config, source: S, client: C, surface: D, exit: ExitSignal) -> Self {
        Self {
            config,
            source,
            client,
            renderer: Renderer::new(surface, exit),
            state: LoopState::Init,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run a single iteration.
    pub fn step(&mut self) -> ControlFlow<StopReason> {
        self.state = LoopState::Running;

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Camera {} reached end of stream.", self.source.describe());
                return ControlFlow::Break(StopReason::EndOfStream);
            }
            Err(err) => {
                log::error!("Failed to grab frame: {err}");
                return ControlFlow::Break(StopReason::Fatal(err.into()));
            }
        };
        self.stats.iterations += 1;

        let labels = match self.client.detect(&frame, self.config) {
            Ok(labels) => {
                self.stats.labeled_frames += 1;
                labels.constrain(self.config)
            }
            Err(err) if err.is_transient() => {
                self.stats.transient_failures += 1;
                log::warn!(
                    "Frame {}: {err}; showing it without labels.",
                    frame.sequence()
                );
                LabelResult::empty()
            }
            Err(err) => {
                log::error!("Frame {}: {err}", frame.sequence());
                return ControlFlow::Break(StopReason::Fatal(err.into()));
            }
        };

        if let Err(err) = self.renderer.render(&frame, &labels) {
            log::error!("{err}");
            return ControlFlow::Break(StopReason::Fatal(err.into()));
        }

        if self.renderer.poll_exit() {
            log::info!("Exit requested by user.");
            return ControlFlow::Break(StopReason::ExitRequested);
        }
        ControlFlow::Continue(())
    }

    /// Loop until exit, end of stream, or a fatal error, then release
    /// the camera and display.
    pub fn run(mut self) -> RunReport {
        log::info!(
            "Starting label loop ({} via {}).",
            self.source.describe(),
            self.client.name()
        );
        let reason = loop {
            if let ControlFlow::Break(reason) = self.step() {
                break reason;
            }
        };
        self.drain();
        RunReport {
            reason,
            stats: self.stats,
            state: self.state,
        }
    }

    fn drain(&mut self) {
        self.state = LoopState::Draining;
        log::info!("Releasing camera and closing display...");
        self.source.release();
        self.renderer.release();
        log::info!(
            "Processed {} frames ({} labeled, {} transient failures).",
            self.stats.iterations,
            self.stats.labeled_frames,
            self.stats.transient_failures
        );
        self.state = LoopState::Terminated;
    }
}

/// Build the configured camera, label client, and display, then run the loop.
///
/// A failure while building any component ends the run without entering the
/// loop. Components built before the failure are released.
pub fn run(config: &Config, exit: ExitSignal) -> RunReport {
    let client = match RekognitionClient::new(config) {
        Ok(client) => client,
        Err(err) => return RunReport::failed_at_init(err.into()),
    };
    let mut source = match open_source(config.camera()) {
        Ok(source) => source,
        Err(err) => return RunReport::failed_at_init(err.into()),
    };
    let surface = match open_display(config.display()) {
        Ok(surface) => surface,
        Err(err) => {
            source.release();
            return RunReport::failed_at_init(err.into());
        }
    };
    Pipeline::new(config, source, client, surface, exit).run()
}
