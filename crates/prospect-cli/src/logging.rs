use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PROSPECT_LOG";
const LOG_FILE: &str = "prospect.log";

/// Route `tracing` output to `<logs_dir>/prospect.log`. The terminal UI owns
/// stdout, so nothing is written there. Filter with `PROSPECT_LOG`.
pub fn init(logs_dir: &Path) -> io::Result<PathBuf> {
    let log_path = logs_dir.join(LOG_FILE);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(log_file))
        .try_init();
    if let Err(err) = installed {
        eprintln!("logging already initialised: {err}");
    }
    Ok(log_path)
}

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}
