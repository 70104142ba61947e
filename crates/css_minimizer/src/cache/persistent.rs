use std::path::PathBuf;
use std::sync::Arc;

use css_minimizer_core::cache::{Cache, CacheRef, FsCache};
use css_minimizer_core::types::{MinifyResult, RawWarning};
use serde::{Deserialize, Serialize};

/// A successful minification as stored in the persistent tier
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResult {
  pub code: String,
  pub map: Option<String>,
  #[serde(default)]
  pub warnings: Vec<RawWarning>,
}

impl CachedResult {
  /// Returns `None` for failed results, which are never cached
  pub fn from_result(result: MinifyResult) -> Option<Self> {
    if result.is_error() {
      return None;
    }

    Some(CachedResult {
      code: result.code,
      map: result.map,
      warnings: result.warnings,
    })
  }
}

/// The persistent tier backend, selected by the host integration
#[derive(Clone)]
pub enum PersistentCache {
  /// Entries are files in a local directory
  Directory(Arc<FsCache>),
  /// Entries are stored by the host's own cache service
  Host(CacheRef),
}

impl std::fmt::Debug for PersistentCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PersistentCache::Directory(cache) => f
        .debug_tuple("Directory")
        .field(&cache.cache_dir())
        .finish(),
      PersistentCache::Host(_) => f.write_str("Host"),
    }
  }
}

impl PersistentCache {
  pub fn directory(path: impl Into<PathBuf>) -> Self {
    PersistentCache::Directory(Arc::new(FsCache::new(path.into())))
  }

  fn backend(&self) -> &dyn Cache {
    match self {
      PersistentCache::Directory(cache) => cache.as_ref(),
      PersistentCache::Host(cache) => cache.as_ref(),
    }
  }

  #[tracing::instrument(level = "trace", skip(self))]
  pub fn read(&self, identity: &str) -> anyhow::Result<Option<Vec<u8>>> {
    self.backend().get_blob(identity)
  }

  #[tracing::instrument(level = "trace", skip(self, blob))]
  pub fn write(&self, identity: &str, blob: &[u8]) -> anyhow::Result<()> {
    self.backend().set_blob(identity, blob)
  }
}
