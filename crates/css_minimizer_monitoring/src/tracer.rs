//! Configures `tracing_subscriber` to write to a log file, standard output
//! and/or a Chrome profile.
use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::from_env::{optional_var, FromEnvError};

pub const TRACING_MODE_VAR: &str = "CSS_MINIMIZER_TRACING_MODE";

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Output the Tracer logs to Stdout
  Stdout,
  /// Output a Chrome profile
  Chrome,
}

impl TracerMode {
  /// Parses a comma separated list such as `stdout,chrome`
  pub fn parse_list(value: &str) -> Result<Vec<Self>, FromEnvError> {
    let mut tracer_modes = vec![];

    for mode in value.split(',').map(|s| s.trim()) {
      let mode = match mode {
        "stdout" => TracerMode::Stdout,
        "chrome" => TracerMode::Chrome,
        // The log file is always written
        "file" | "" => continue,
        value => {
          return Err(FromEnvError::InvalidKey(
            String::from(TRACING_MODE_VAR),
            anyhow!("Invalid value: {}", value),
          ))
        }
      };

      if !tracer_modes.contains(&mode) {
        tracer_modes.push(mode);
      }
    }

    Ok(tracer_modes)
  }

  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    match optional_var(TRACING_MODE_VAR) {
      Some(value) => TracerMode::parse_list(&value),
      None => Ok(vec![]),
    }
  }
}

enum TracerGuard {
  #[allow(unused)]
  WorkerGuard(WorkerGuard),
  #[allow(unused)]
  ChromeGuard(tracing_chrome::FlushGuard),
}

/// Keeps the non-blocking writers alive, dropping it flushes them
pub struct Tracer {
  #[allow(unused)]
  guards: Vec<TracerGuard>,
}

impl Tracer {
  pub fn new(options: &[TracerMode]) -> anyhow::Result<Self> {
    let mut guards = vec![];

    // We will always write tracing to the log file
    let directory = std::env::temp_dir().join("css_minimizer_trace");
    let file_appender = tracing_appender::rolling::Builder::new()
      .rotation(tracing_appender::rolling::Rotation::HOURLY)
      .max_log_files(4)
      .filename_prefix("css-minimizer-tracing")
      .build(&directory)
      .map_err(|err| anyhow!(err))?;
    let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);

    let layer = tracing_subscriber::fmt::layer()
      .with_writer(non_blocking)
      .with_span_events(FmtSpan::CLOSE)
      .with_filter(EnvFilter::from_default_env());

    guards.push(TracerGuard::WorkerGuard(worker_guard));

    let stdout_layer = if options.contains(&TracerMode::Stdout) {
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
      let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());

      guards.push(TracerGuard::WorkerGuard(worker_guard));

      Some(stdout_layer)
    } else {
      None
    };

    let chrome_layer = if options.contains(&TracerMode::Chrome) {
      let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .include_args(true)
        .build();

      guards.push(TracerGuard::ChromeGuard(guard));

      Some(chrome_layer)
    } else {
      None
    };

    let subscriber = Registry::default()
      .with(layer)
      .with(stdout_layer)
      .with(chrome_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Tracer { guards })
  }
}
