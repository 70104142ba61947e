use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters of one optimize pass
#[derive(Debug, Default)]
pub struct CacheStats {
  memory_hits: AtomicU64,
  persistent_hits: AtomicU64,
  misses: AtomicU64,
  errors: AtomicU64,
  stores: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
  pub memory_hits: u64,
  pub persistent_hits: u64,
  pub misses: u64,
  /// Read, decode and write failures of the persistent tier
  pub errors: u64,
  pub stores: u64,
}

impl CacheStatsSnapshot {
  pub fn hits(&self) -> u64 {
    self.memory_hits + self.persistent_hits
  }

  pub fn log(&self) {
    tracing::info!("CSS minimizer cache stats: {:#?}", self);
  }
}

impl CacheStats {
  pub fn record_memory_hit(&self) {
    self.memory_hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_persistent_hit(&self) {
    self.persistent_hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_error(&self) {
    self.errors.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_store(&self) {
    self.stores.fetch_add(1, Ordering::Relaxed);
  }

  /// Returns the counters and resets them for the next pass
  pub fn take(&self) -> CacheStatsSnapshot {
    CacheStatsSnapshot {
      memory_hits: self.memory_hits.swap(0, Ordering::Relaxed),
      persistent_hits: self.persistent_hits.swap(0, Ordering::Relaxed),
      misses: self.misses.swap(0, Ordering::Relaxed),
      errors: self.errors.swap(0, Ordering::Relaxed),
      stores: self.stores.swap(0, Ordering::Relaxed),
    }
  }
}
