use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub type CacheRef = Arc<dyn Cache + Sync + Send>;

/// A persistent, content-addressed blob store.
///
/// Keys are digests computed by the caller, values are opaque serialized
/// bytes. Implementations are expected to be safe for concurrent `get_blob`
/// and `set_blob` calls.
#[mockall::automock]
pub trait Cache {
  /// Returns `Ok(None)` when there is no entry for `key`.
  fn get_blob(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

  fn set_blob(&self, key: &str, blob: &[u8]) -> anyhow::Result<()>;
}

/// Convert a cache key to a safe filesystem path.
/// Sanitizes `..` in path segments to avoid directory traversal.
pub fn get_file_key(cache_dir: &Path, key: &str) -> PathBuf {
  let clean_key = key
    .split('/')
    .map(|part| {
      if part == ".." {
        "$$__parent_dir$$"
      } else {
        part
      }
    })
    .collect::<Vec<_>>()
    .join("/");
  cache_dir.join(clean_key)
}

/// A filesystem-only cache implementation.
/// Stores all blobs on the filesystem under `{cache_dir}/{key}`.
#[derive(Debug)]
pub struct FsCache {
  cache_dir: PathBuf,
}

impl FsCache {
  pub fn new(cache_dir: PathBuf) -> Self {
    Self { cache_dir }
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }
}

impl Cache for FsCache {
  fn get_blob(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let file_path = get_file_key(&self.cache_dir, key);
    match fs::read(&file_path) {
      Ok(blob) => Ok(Some(blob)),
      Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
      Err(error) => Err(error.into()),
    }
  }

  fn set_blob(&self, key: &str, blob: &[u8]) -> anyhow::Result<()> {
    let file_path = get_file_key(&self.cache_dir, key);
    if let Some(parent) = file_path.parent() {
      fs::create_dir_all(parent)?;
    }

    // Write to a sibling file first so concurrent readers never observe a
    // partially written entry.
    let tmp_path = file_path.with_extension(format!("tmp-{}", std::process::id()));
    fs::write(&tmp_path, blob)?;
    fs::rename(&tmp_path, &file_path)?;
    Ok(())
  }
}
