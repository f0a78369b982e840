//! Log setup: `env_logger` on stderr, mirrored into an append-only log file.
//!
//! `RUST_LOG` controls the filter; the default is `info`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes every record to stderr and, when available, to a file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // A failing log file must not take the console log down with it.
            if file.write_all(buf).is_err() {
                self.file = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global logger. Calling it twice leaves the first logger in place.
pub fn init(log_file: Option<&Path>) {
    let mut file_error = None;
    let file = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(file),
        Err(err) => {
            file_error = Some((path.to_path_buf(), err));
            None
        }
    });

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .try_init();

    if let Some((path, err)) = file_error {
        log::warn!(
            "cannot open log file {}: {err}; logging to stderr only",
            path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_appends_to_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("live_labels.log");
        let mut tee = Tee {
            file: Some(open_log_file(&path)?),
        };
        tee.write_all(b"first\n")?;
        tee.flush()?;
        let mut tee = Tee {
            file: Some(open_log_file(&path)?),
        };
        tee.write_all(b"second\n")?;
        tee.flush()?;
        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn unopenable_file_falls_back_to_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("no-such-dir").join("app.log");
        assert!(open_log_file(&missing).is_err());
        init(Some(&missing));
        log::info!("still logging");
    }
}
