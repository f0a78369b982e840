use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use live_labels::config::{
    CameraSpec, Config, ConfigError, DisplayMode, Environment, ENV_ACCESS_KEY_ID, ENV_CAMERA,
    ENV_CONFIG_FILE, ENV_DEFAULT_REGION, ENV_DISPLAY, ENV_ENDPOINT, ENV_JPEG_QUALITY,
    ENV_MAX_LABELS, ENV_MIN_CONFIDENCE, ENV_REGION, ENV_REQUEST_TIMEOUT_SECS,
    ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        ENV_ACCESS_KEY_ID,
        ENV_SECRET_ACCESS_KEY,
        ENV_SESSION_TOKEN,
        ENV_REGION,
        ENV_DEFAULT_REGION,
        ENV_CONFIG_FILE,
        ENV_MAX_LABELS,
        ENV_MIN_CONFIDENCE,
        ENV_CAMERA,
        ENV_DISPLAY,
        ENV_JPEG_QUALITY,
        ENV_ENDPOINT,
        ENV_REQUEST_TIMEOUT_SECS,
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_from_process_environment_and_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(
        br#"{
            "max_labels": 4,
            "min_confidence": 60.0,
            "camera": "stub://lobby?frames=3",
            "display": "headless",
            "request_timeout_secs": 8
        }"#,
    )
    .expect("write config");

    std::env::set_var(ENV_ACCESS_KEY_ID, "AKIDEXAMPLE");
    std::env::set_var(ENV_SECRET_ACCESS_KEY, "secret");
    std::env::set_var(ENV_REGION, "us-east-2");
    std::env::set_var(ENV_CONFIG_FILE, file.path());
    std::env::set_var(ENV_MIN_CONFIDENCE, "82.5");

    let cfg = Config::load().expect("load config");
    assert_eq!(cfg.region(), "us-east-2");
    assert_eq!(cfg.max_labels(), 4);
    // Environment wins over the file.
    assert_eq!(cfg.min_confidence(), 82.5);
    assert_eq!(cfg.display(), DisplayMode::Headless);
    assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(8)));
    assert!(matches!(
        cfg.camera(),
        CameraSpec::Synthetic {
            frames: Some(3),
            ..
        }
    ));
    assert_eq!(cfg.credentials().access_key_id(), "AKIDEXAMPLE");
    assert!(cfg.credentials().session_token().is_none());

    clear_env();
}

#[test]
fn missing_credentials_fail_at_startup() {
    let err = Config::from_environment(&Environment::from_pairs([(ENV_REGION, "us-east-1")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Missing {
            key: ENV_ACCESS_KEY_ID
        }
    ));
    assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
}

#[test]
fn dotenv_file_supplies_missing_values() {
    let mut dotenv = NamedTempFile::new().expect("temp dotenv");
    writeln!(dotenv, "# local development credentials").expect("write");
    writeln!(dotenv, "AWS_ACCESS_KEY_ID=AKIDFROMFILE").expect("write");
    writeln!(dotenv, "AWS_SECRET_ACCESS_KEY=\"file secret\"").expect("write");
    writeln!(dotenv, "export AWS_REGION=ca-central-1").expect("write");
    writeln!(dotenv, "LIVE_LABELS_MAX_LABELS=7").expect("write");

    let mut env = Environment::default();
    env.merge_dotenv_file(dotenv.path()).expect("merge");
    let cfg = Config::from_environment(&env).expect("config");
    assert_eq!(cfg.credentials().access_key_id(), "AKIDFROMFILE");
    assert_eq!(cfg.credentials().secret_access_key(), "file secret");
    assert_eq!(cfg.region(), "ca-central-1");
    assert_eq!(cfg.max_labels(), 7);
}

#[test]
fn unreadable_config_file_is_a_config_error() {
    let env = Environment::from_pairs([
        (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE"),
        (ENV_SECRET_ACCESS_KEY, "secret"),
        (ENV_REGION, "us-east-1"),
        (ENV_CONFIG_FILE, "/nonexistent/live-labels.json"),
    ]);
    assert!(matches!(
        Config::from_environment(&env),
        Err(ConfigError::File { .. })
    ));
}

#[test]
fn malformed_config_file_is_rejected() {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ max_labels: ").expect("write");
    let env = Environment::from_pairs([
        (ENV_ACCESS_KEY_ID, "AKIDEXAMPLE".to_string()),
        (ENV_SECRET_ACCESS_KEY, "secret".to_string()),
        (ENV_REGION, "us-east-1".to_string()),
        (ENV_CONFIG_FILE, file.path().display().to_string()),
    ]);
    let err = Config::from_environment(&env).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}

#[cfg(unix)]
#[test]
fn non_unicode_variables_are_skipped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("LIVE_LABELS_TEST_BYTES", OsStr::from_bytes(b"f\xffo"));
    std::env::set_var(ENV_CAMERA, "stub://lobby");

    let env = Environment::capture().expect("capture");
    assert_eq!(env.get(ENV_CAMERA), Some("stub://lobby"));
    assert_eq!(env.get("LIVE_LABELS_TEST_BYTES"), None);

    std::env::remove_var("LIVE_LABELS_TEST_BYTES");
    clear_env();
}
