use std::sync::Arc;

use css_minimizer_core::types::AssetSource;

use super::{CacheStats, CacheStatsSnapshot, CachedResult, IdentityMap, PersistentCache};

/// Looks up and stores results of minification tasks in both tiers.
///
/// Persistent tier failures are logged and absorbed: a failed read is a miss
/// and a failed write is a no-op.
#[derive(Default)]
pub struct TaskCache {
  memory: IdentityMap<AssetSource, Arc<CachedResult>>,
  persistent: Option<PersistentCache>,
  stats: CacheStats,
}

impl TaskCache {
  pub fn new(persistent: Option<PersistentCache>) -> Self {
    TaskCache {
      persistent,
      ..TaskCache::default()
    }
  }

  pub fn persistent(&self) -> Option<&PersistentCache> {
    self.persistent.as_ref()
  }

  #[tracing::instrument(level = "debug", skip(self, source))]
  pub fn get(&self, source: &Arc<AssetSource>, identity: &str) -> Option<Arc<CachedResult>> {
    if let Some(result) = self.memory.get(source) {
      self.stats.record_memory_hit();
      return Some(result);
    }

    let Some(persistent) = &self.persistent else {
      self.stats.record_miss();
      return None;
    };

    let blob = match persistent.read(identity) {
      Ok(Some(blob)) => blob,
      Ok(None) => {
        self.stats.record_miss();
        return None;
      }
      Err(err) => {
        // We don't want to fail a minification for a cache read error
        tracing::error!("Failed to read cache entry {}:\n{:#}", identity, err);
        self.stats.record_error();
        self.stats.record_miss();
        return None;
      }
    };

    match serde_json::from_slice::<CachedResult>(&blob) {
      Ok(result) => {
        self.stats.record_persistent_hit();
        let result = Arc::new(result);
        self.memory.insert_if_absent(source, result.clone());
        Some(result)
      }
      Err(err) => {
        tracing::error!("Corrupted cache entry {}: {}", identity, err);
        self.stats.record_error();
        self.stats.record_miss();
        None
      }
    }
  }

  /// Looks up the memory tier only. Misses are not counted.
  pub fn recall(&self, source: &Arc<AssetSource>) -> Option<Arc<CachedResult>> {
    let result = self.memory.get(source)?;
    self.stats.record_memory_hit();
    Some(result)
  }

  /// Stores a result in memory and, when configured, persistently
  #[tracing::instrument(level = "debug", skip(self, source, result))]
  pub fn store(&self, source: &Arc<AssetSource>, identity: &str, result: Arc<CachedResult>) {
    self.remember(source, result.clone());

    let Some(persistent) = &self.persistent else {
      return;
    };

    let blob = match serde_json::to_vec(result.as_ref()) {
      Ok(blob) => blob,
      Err(err) => {
        tracing::error!("Failed to serialize cache entry {}: {}", identity, err);
        self.stats.record_error();
        return;
      }
    };

    match persistent.write(identity, &blob) {
      Ok(()) => self.stats.record_store(),
      Err(err) => {
        tracing::error!("Failed to write cache entry {}:\n{:#}", identity, err);
        self.stats.record_error();
      }
    }
  }

  /// Stores a result in the memory tier only
  pub fn remember(&self, source: &Arc<AssetSource>, result: Arc<CachedResult>) {
    self.memory.insert_if_absent(source, result);
  }

  /// Ends a pass: returns its counters and drops entries of released sources
  pub fn finish_pass(&self) -> CacheStatsSnapshot {
    self.memory.reclaim();
    self.stats.take()
  }
}
