//! live-labels - show a camera feed with AWS Rekognition labels drawn on it.
//!
//! Configuration comes from the environment (and `.env`); the flags below
//! override individual settings for one run.
//!
//! Device cameras need the `ingest-v4l2` feature and the window display needs
//! `display-window`; neither is on by default.
//!
//! Exit codes: 0 after `q`/Escape/window close/Ctrl-C or end of stream,
//! 1 on camera, label service, or display failures, 2 on configuration errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use live_labels::config::{
    log_file_setting, Config, Environment, ENV_CAMERA, ENV_DISPLAY, ENV_MAX_LABELS,
    ENV_MIN_CONFIDENCE,
};
use live_labels::pipeline::{self, FatalError, StopReason};
use live_labels::{logging, ExitSignal};

const BUILD_NOTE: &str = "\
The defaults (camera 0, window display) need a build with
`--features ingest-v4l2,display-window`. Without those features use a
stub:// camera and `--display headless`, or the run stops at startup
with exit code 1.";

#[derive(Parser, Debug)]
#[command(
    name = "live-labels",
    version,
    about = "Overlay AWS Rekognition labels on a live camera feed",
    after_help = BUILD_NOTE
)]
struct Args {
    /// Additional dotenv file, applied over `.env` and the process environment.
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Camera: device index, V4L2 device path, or stub://name?frames=N
    #[arg(long, value_name = "CAMERA")]
    camera: Option<String>,

    /// Display mode: window or headless.
    #[arg(long, value_name = "MODE")]
    display: Option<String>,

    /// Maximum number of labels drawn per frame.
    #[arg(long, value_name = "N")]
    max_labels: Option<u32>,

    /// Minimum label confidence, in percent.
    #[arg(long, value_name = "PERCENT")]
    min_confidence: Option<f32>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let env = match build_environment(&args) {
        Ok(env) => env,
        Err(err) => {
            logging::init(None);
            log::error!("Configuration error: {err}");
            return exit_code(&FatalError::Config(err));
        }
    };
    logging::init(log_file_setting(&env).as_deref());
    log::info!("live-labels {} starting.", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_environment(&env) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Configuration error: {err}");
            return exit_code(&FatalError::Config(err));
        }
    };
    log::info!(
        "Region {}, camera {}, max {} labels at >= {}% confidence.",
        config.region(),
        config.camera().describe(),
        config.max_labels(),
        config.min_confidence()
    );

    let exit = match ExitSignal::install() {
        Ok(exit) => exit,
        Err(err) => {
            log::warn!("cannot install Ctrl-C handler: {err}");
            ExitSignal::new()
        }
    };

    let report = pipeline::run(&config, exit);
    match &report.reason {
        StopReason::Fatal(err) => log::error!("Stopped: {err}"),
        StopReason::ExitRequested | StopReason::EndOfStream => {}
    }
    log::info!("Application finished.");
    ExitCode::from(report.exit_code() as u8)
}

fn build_environment(args: &Args) -> Result<Environment, live_labels::ConfigError> {
    let mut env = Environment::capture()?;
    if let Some(path) = &args.env_file {
        env.merge_dotenv_file(path)?;
    }
    if let Some(camera) = &args.camera {
        env.set(ENV_CAMERA, camera.as_str());
    }
    if let Some(display) = &args.display {
        env.set(ENV_DISPLAY, display.as_str());
    }
    if let Some(max_labels) = args.max_labels {
        env.set(ENV_MAX_LABELS, max_labels.to_string());
    }
    if let Some(min_confidence) = args.min_confidence {
        env.set(ENV_MIN_CONFIDENCE, min_confidence.to_string());
    }
    Ok(env)
}

fn exit_code(err: &FatalError) -> ExitCode {
    ExitCode::from(err.exit_code() as u8)
}
