//! Process-wide configuration.
//!
//! Everything is read once, at startup, from an [`Environment`] snapshot: a
//! `.env` file in the working directory overlaid by the process environment.
//! Non-secret settings may also come from a JSON file named by
//! `LIVE_LABELS_CONFIG`; environment values win over file values.
//!
//! The resulting [`Config`] is immutable and handed to components by
//! reference. Components never look at the environment themselves.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_CONFIG_FILE: &str = "LIVE_LABELS_CONFIG";
pub const ENV_MAX_LABELS: &str = "LIVE_LABELS_MAX_LABELS";
pub const ENV_MIN_CONFIDENCE: &str = "LIVE_LABELS_MIN_CONFIDENCE";
pub const ENV_CAMERA: &str = "LIVE_LABELS_CAMERA";
pub const ENV_DISPLAY: &str = "LIVE_LABELS_DISPLAY";
pub const ENV_JPEG_QUALITY: &str = "LIVE_LABELS_JPEG_QUALITY";
pub const ENV_ENDPOINT: &str = "LIVE_LABELS_ENDPOINT";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "LIVE_LABELS_REQUEST_TIMEOUT_SECS";
pub const ENV_LOG_FILE: &str = "LIVE_LABELS_LOG_FILE";

const DOTENV_FILE: &str = ".env";
const DEFAULT_MAX_LABELS: u32 = 10;
const DEFAULT_MIN_CONFIDENCE: f32 = 75.0;
const DEFAULT_CAMERA: &str = "0";
const DEFAULT_JPEG_QUALITY: u8 = 90;
const DEFAULT_LOG_FILE: &str = "live_labels.log";
const MAX_LABELS_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} not found in environment variables or .env file")]
    Missing { key: &'static str },
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read {}: {message}", .path.display())]
    File { path: PathBuf, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

// -------------------- Environment snapshot --------------------

/// Snapshot of configuration variables taken once at startup.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// `.env` in the working directory (if present), overlaid by the process environment.
    pub fn capture() -> Result<Self, ConfigError> {
        let mut env = Self::default();
        let dotenv = Path::new(DOTENV_FILE);
        if dotenv.is_file() {
            env.merge_dotenv_file(dotenv)?;
        }
        // Entries that are not valid Unicode cannot be settings of ours.
        env.vars.extend(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }));
        Ok(env)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Adds the entries of a dotenv-style file. Existing entries are overwritten.
    pub fn merge_dotenv_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.vars.extend(parse_dotenv(&raw));
        Ok(())
    }

    /// Override a single entry (command-line flags take precedence over everything).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Returns the trimmed value, treating blank values as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn parse_dotenv(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// -------------------- Credentials --------------------

/// AWS credentials. The secret parts are wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// -------------------- Camera / display selection --------------------

/// Which frame source to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraSpec {
    /// `stub://name?frames=N&width=W&height=H`
    Synthetic {
        name: String,
        frames: Option<u64>,
        width: u32,
        height: u32,
    },
    /// A V4L2 device node. Bare indices map to `/dev/videoN`.
    Device(PathBuf),
}

const DEFAULT_SYNTHETIC_WIDTH: u32 = 640;
const DEFAULT_SYNTHETIC_HEIGHT: u32 = 480;

impl CameraSpec {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.starts_with("stub://") {
            return parse_synthetic(value);
        }
        if let Ok(index) = value.parse::<u32>() {
            return Ok(CameraSpec::Device(PathBuf::from(format!("/dev/video{index}"))));
        }
        if value.is_empty() {
            return Err(ConfigError::invalid(ENV_CAMERA, value, "camera must not be empty"));
        }
        Ok(CameraSpec::Device(PathBuf::from(value)))
    }

    pub fn describe(&self) -> String {
        match self {
            CameraSpec::Synthetic { name, .. } => format!("stub://{name}"),
            CameraSpec::Device(path) => path.display().to_string(),
        }
    }
}

fn parse_synthetic(value: &str) -> Result<CameraSpec, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(ENV_CAMERA, value, e.to_string()))?;
    let name = url.host_str().unwrap_or("camera").to_string();
    let mut frames = None;
    let mut width = DEFAULT_SYNTHETIC_WIDTH;
    let mut height = DEFAULT_SYNTHETIC_HEIGHT;
    for (key, raw) in url.query_pairs() {
        let parsed: u64 = raw.parse().map_err(|_| {
            ConfigError::invalid(ENV_CAMERA, value, format!("{key} must be an integer"))
        })?;
        match &*key {
            "frames" => frames = Some(parsed),
            "width" | "height" => {
                let dim = u32::try_from(parsed)
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| {
                        ConfigError::invalid(ENV_CAMERA, value, format!("{key} must be > 0"))
                    })?;
                if key == "width" {
                    width = dim;
                } else {
                    height = dim;
                }
            }
            other => {
                return Err(ConfigError::invalid(
                    ENV_CAMERA,
                    value,
                    format!("unknown stub option '{other}'"),
                ))
            }
        }
    }
    Ok(CameraSpec::Synthetic {
        name,
        frames,
        width,
        height,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Window,
    Headless,
}

impl DisplayMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "window" => Ok(DisplayMode::Window),
            "headless" | "none" => Ok(DisplayMode::Headless),
            _ => Err(ConfigError::invalid(
                ENV_DISPLAY,
                value,
                "expected 'window' or 'headless'",
            )),
        }
    }
}

// -------------------- Config --------------------

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    max_labels: Option<u32>,
    min_confidence: Option<f32>,
    camera: Option<String>,
    display: Option<String>,
    jpeg_quality: Option<u8>,
    endpoint: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Immutable process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    max_labels: u32,
    min_confidence: f32,
    region: String,
    credentials: Credentials,
    camera: CameraSpec,
    display: DisplayMode,
    jpeg_quality: u8,
    endpoint: Option<Url>,
    request_timeout: Option<Duration>,
    log_file: Option<PathBuf>,
}

impl Config {
    /// Captures the environment and loads the configuration from it.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_environment(&Environment::capture()?)
    }

    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        let file = match env.get(ENV_CONFIG_FILE) {
            Some(path) => read_config_file(Path::new(path))?,
            None => ConfigFile::default(),
        };

        let region = env
            .get(ENV_REGION)
            .or_else(|| env.get(ENV_DEFAULT_REGION))
            .ok_or(ConfigError::Missing { key: ENV_REGION })?
            .to_string();
        validate_region(&region)?;

        let access_key_id = env
            .get(ENV_ACCESS_KEY_ID)
            .ok_or(ConfigError::Missing {
                key: ENV_ACCESS_KEY_ID,
            })?;
        let secret_access_key = env
            .get(ENV_SECRET_ACCESS_KEY)
            .ok_or(ConfigError::Missing {
                key: ENV_SECRET_ACCESS_KEY,
            })?;
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            env.get(ENV_SESSION_TOKEN).map(str::to_string),
        );

        let max_labels = match env.get(ENV_MAX_LABELS) {
            Some(raw) => parse_number(ENV_MAX_LABELS, raw)?,
            None => file.max_labels.unwrap_or(DEFAULT_MAX_LABELS),
        };
        if max_labels == 0 || max_labels > MAX_LABELS_LIMIT {
            return Err(ConfigError::invalid(
                ENV_MAX_LABELS,
                max_labels.to_string(),
                format!("must be between 1 and {MAX_LABELS_LIMIT}"),
            ));
        }

        let min_confidence = match env.get(ENV_MIN_CONFIDENCE) {
            Some(raw) => parse_number(ENV_MIN_CONFIDENCE, raw)?,
            None => file.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
        };
        if !(0.0..=100.0).contains(&min_confidence) {
            return Err(ConfigError::invalid(
                ENV_MIN_CONFIDENCE,
                min_confidence.to_string(),
                "must be between 0 and 100",
            ));
        }

        let camera = CameraSpec::parse(
            env.get(ENV_CAMERA)
                .or(file.camera.as_deref())
                .unwrap_or(DEFAULT_CAMERA),
        )?;

        let display = match env.get(ENV_DISPLAY).or(file.display.as_deref()) {
            Some(raw) => DisplayMode::parse(raw)?,
            None => DisplayMode::Window,
        };

        let jpeg_quality = match env.get(ENV_JPEG_QUALITY) {
            Some(raw) => parse_number(ENV_JPEG_QUALITY, raw)?,
            None => file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        };
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::invalid(
                ENV_JPEG_QUALITY,
                jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }

        let endpoint = match env.get(ENV_ENDPOINT).or(file.endpoint.as_deref()) {
            Some(raw) => Some(parse_endpoint(raw)?),
            None => None,
        };

        let request_timeout = match env.get(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => Some(parse_number::<u64>(ENV_REQUEST_TIMEOUT_SECS, raw)?),
            None => file.request_timeout_secs,
        }
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

        Ok(Self {
            max_labels,
            min_confidence,
            region,
            credentials,
            camera,
            display,
            jpeg_quality,
            endpoint,
            request_timeout,
            log_file: log_file_setting(env),
        })
    }

    pub fn max_labels(&self) -> u32 {
        self.max_labels
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn camera(&self) -> &CameraSpec {
        &self.camera
    }

    pub fn display(&self) -> DisplayMode {
        self.display
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Explicit service endpoint, if one overrides the regional default.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Overall request timeout. `None` leaves the transport defaults in place.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Log file location. Needed before the rest of the configuration is
/// validated so that configuration errors reach the log too.
pub fn log_file_setting(env: &Environment) -> Option<PathBuf> {
    match env.vars.get(ENV_LOG_FILE) {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(PathBuf::from(value.trim())),
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: format!("invalid config file: {e}"),
    })
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::invalid(key, raw, "not a valid number"))
}

fn validate_region(region: &str) -> Result<(), ConfigError> {
    let valid = region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && region.contains('-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            ENV_REGION,
            region,
            "expected a region name such as us-east-1",
        ))
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(ENV_ENDPOINT, raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ConfigError::invalid(
            ENV_ENDPOINT,
            raw,
            "expected an http(s) URL with a host",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE"),
            (ENV_SECRET_ACCESS_KEY, "secret"),
            (ENV_REGION, "eu-west-1"),
        ]
    }

    fn load_with(extra: &[(&'static str, &'static str)]) -> Result<Config, ConfigError> {
        let mut pairs = base_env();
        pairs.extend_from_slice(extra);
        Config::from_environment(&Environment::from_pairs(pairs))
    }

    #[test]
    fn defaults_match_documented_values() -> Result<(), ConfigError> {
        let cfg = load_with(&[])?;
        assert_eq!(cfg.max_labels(), 10);
        assert_eq!(cfg.min_confidence(), 75.0);
        assert_eq!(cfg.region(), "eu-west-1");
        assert_eq!(cfg.camera(), &CameraSpec::Device(PathBuf::from("/dev/video0")));
        assert_eq!(cfg.display(), DisplayMode::Window);
        assert_eq!(cfg.jpeg_quality(), 90);
        assert!(cfg.endpoint().is_none());
        assert!(cfg.request_timeout().is_none());
        Ok(())
    }

    #[test]
    fn missing_region_is_reported_by_name() {
        let env = Environment::from_pairs([
            (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE"),
            (ENV_SECRET_ACCESS_KEY, "secret"),
        ]);
        let err = Config::from_environment(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: ENV_REGION }));
    }

    #[test]
    fn default_region_is_a_fallback() -> Result<(), ConfigError> {
        let env = Environment::from_pairs([
            (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE"),
            (ENV_SECRET_ACCESS_KEY, "secret"),
            (ENV_DEFAULT_REGION, "ap-southeast-2"),
        ]);
        assert_eq!(Config::from_environment(&env)?.region(), "ap-southeast-2");
        Ok(())
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let env = Environment::from_pairs([
            (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE"),
            (ENV_SECRET_ACCESS_KEY, "   "),
            (ENV_REGION, "us-east-1"),
        ]);
        let err = Config::from_environment(&env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: ENV_SECRET_ACCESS_KEY
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_settings() {
        assert!(load_with(&[(ENV_MAX_LABELS, "0")]).is_err());
        assert!(load_with(&[(ENV_MIN_CONFIDENCE, "100.5")]).is_err());
        assert!(load_with(&[(ENV_MIN_CONFIDENCE, "abc")]).is_err());
        assert!(load_with(&[(ENV_JPEG_QUALITY, "0")]).is_err());
        assert!(load_with(&[(ENV_DISPLAY, "projector")]).is_err());
        assert!(load_with(&[(ENV_ENDPOINT, "ftp://example.com")]).is_err());
        assert!(load_with(&[(ENV_REGION, "Not A Region")]).is_err());
    }

    #[test]
    fn parses_synthetic_camera_options() -> Result<(), ConfigError> {
        let camera = CameraSpec::parse("stub://bench?frames=10&width=64&height=48")?;
        assert_eq!(
            camera,
            CameraSpec::Synthetic {
                name: "bench".to_string(),
                frames: Some(10),
                width: 64,
                height: 48,
            }
        );
        assert!(CameraSpec::parse("stub://bench?fps=3").is_err());
        assert!(CameraSpec::parse("stub://bench?width=0").is_err());
        Ok(())
    }

    #[test]
    fn numeric_camera_maps_to_device_node() -> Result<(), ConfigError> {
        assert_eq!(
            CameraSpec::parse("2")?,
            CameraSpec::Device(PathBuf::from("/dev/video2"))
        );
        assert_eq!(
            CameraSpec::parse("/dev/v4l/by-id/usb-cam")?,
            CameraSpec::Device(PathBuf::from("/dev/v4l/by-id/usb-cam"))
        );
        Ok(())
    }

    #[test]
    fn dotenv_parsing_handles_quotes_comments_and_export() {
        let parsed = parse_dotenv(
            "# credentials\nexport AWS_REGION=us-west-2\nAWS_ACCESS_KEY_ID=\"AKID\"\n\nAWS_SECRET_ACCESS_KEY='s=cr=t'\nbroken line\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("AWS_REGION".to_string(), "us-west-2".to_string()),
                ("AWS_ACCESS_KEY_ID".to_string(), "AKID".to_string()),
                ("AWS_SECRET_ACCESS_KEY".to_string(), "s=cr=t".to_string()),
            ]
        );
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = Credentials::new("AKID", "super-secret", Some("sess-123".to_string()));
        let printed = format!("{creds:?}");
        assert!(printed.contains("AKID"));
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("sess-123"));
    }

    #[test]
    fn empty_log_file_disables_file_sink() {
        let env = Environment::from_pairs([(ENV_LOG_FILE, "")]);
        assert!(log_file_setting(&env).is_none());
        let env = Environment::default();
        assert_eq!(
            log_file_setting(&env),
            Some(PathBuf::from("live_labels.log"))
        );
    }
}
