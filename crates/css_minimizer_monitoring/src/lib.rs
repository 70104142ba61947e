//! This module configures tracing for the minimizer binaries.
//!
//! Tracing should only be initialized once per process.
use parking_lot::Mutex;

pub use from_env::FromEnvError;
pub use tracer::{TracerMode, TRACING_MODE_VAR};

mod from_env;
mod tracer;

static MONITORING_GUARD: Mutex<Option<tracer::Tracer>> = parking_lot::const_mutex(None);

pub fn initialize_tracing(options: &[TracerMode]) -> anyhow::Result<()> {
  let mut global = MONITORING_GUARD.lock();
  if global.is_some() {
    tracing::warn!("Tracing is getting set-up twice, this will no-op");
    return Ok(());
  }

  *global = Some(tracer::Tracer::new(options)?);

  Ok(())
}

pub fn initialize_from_env() -> anyhow::Result<()> {
  initialize_tracing(&TracerMode::from_env()?)
}

/// Flushes and closes the log writers and the Chrome profile
pub fn close_tracing() {
  MONITORING_GUARD.lock().take();
}
