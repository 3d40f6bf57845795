// src/utils/logging.rs
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_NAME: &str = "processing.log";

/// `<base_dir>/logs/processing.log`, the watcher's default log file.
pub fn default_log_file<P: AsRef<Path>>(base_dir: P) -> PathBuf {
    base_dir.as_ref().join(LOG_DIR).join(LOG_FILE_NAME)
}

/// Sets up the logging framework using tracing_subscriber.
/// Reads log level filters from the `RUST_LOG` environment variable.
/// Defaults to "info" if `RUST_LOG` is not set.
/// With `json` set, console events are written as one JSON object per line.
/// With `log_file` set, events are also appended to that file without colours.
pub fn setup_logging(json: bool, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")); // Default to INFO level

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json {
        registry.with(fmt::layer().json().with_current_span(true)).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    if let Some(path) = log_file {
        tracing::debug!("Also logging to {}", path.display());
    }
    tracing::debug!("Logging setup complete.");
    Ok(())
}

/// Opens `path` for appending, creating it and its parent directories as needed.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn default_log_file_sits_under_logs() {
        assert_eq!(
            default_log_file("/data/intake"),
            PathBuf::from("/data/intake/logs/processing.log")
        );
    }

    #[test]
    fn log_file_is_created_with_parents_and_appended() {
        let dir = TempDir::new().unwrap();
        let path = default_log_file(dir.path());

        writeln!(open_log_file(&path).unwrap(), "first run").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second run").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first run\nsecond run\n");
    }
}
