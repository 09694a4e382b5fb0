use std::env;
use std::ffi::OsString;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rom_curator_core::AppConfig;

const APP_TARGETS: [&str; 2] = ["rom_curator", "rom_curator_core"];

/// This app's targets at `level`, everything else at `warn`.
fn default_directives(level: &str) -> String {
    APP_TARGETS
        .iter()
        .fold("warn".to_string(), |acc, target| format!("{},{}={}", acc, target, level))
}

/// Log to stdout and to the configured log file.
///
/// `TRACING_LEVEL` replaces the filter and `LOG_FILE_PATH` the file when set.
/// The console gets compact lines; the file keeps timestamps and targets.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_logger(config: &AppConfig) -> WorkerGuard {
    let directives =
        env::var("TRACING_LEVEL").unwrap_or_else(|_| default_directives(&config.log_level));
    let filter_layer = EnvFilter::new(directives);

    let log_file = env::var("LOG_FILE_PATH").unwrap_or_else(|_| config.log_file_path.clone());
    let log_path = Path::new(&log_file);
    let directory = log_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("rom-curator.log"));

    let file_appender = tracing_appender::rolling::never(directory, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .compact()
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    info!(
        "rom-curator {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        directory.join(&file_name).display()
    );

    guard
}
