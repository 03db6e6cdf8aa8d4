//! # SWARD
//!
//! Renders a configured grass field for a fixed number of frames and logs
//! per-frame culling statistics.
//!
//! ```bash
//! sward                      # config/sward.toml, or defaults if missing
//! sward path/to/field.toml
//! RUST_LOG=sward_batch=debug sward
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use sward::{run, AppConfig, AppResult};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/sward.toml";

fn load_config() -> AppResult<AppConfig> {
    match std::env::args_os().nth(1) {
        Some(path) => AppConfig::load(PathBuf::from(path)),
        None if std::path::Path::new(DEFAULT_CONFIG).exists() => AppConfig::load(DEFAULT_CONFIG),
        None => {
            warn!("{DEFAULT_CONFIG} not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match load_config().and_then(|config| run(&config)) {
        Ok(report) => {
            let visible: u64 = report
                .frames
                .iter()
                .map(|f| u64::from(f.visible_instances))
                .sum();
            let average = visible / report.frames.len().max(1) as u64;
            info!(
                instances = report.instances,
                buffer_bytes = report.buffer_bytes,
                frames = report.frames.len(),
                average_visible = average,
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}
