use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::str;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::JSONObject;

/// The contents of an asset.
///
/// Assets may hold arbitrary bytes, the minimizer normalizes them to UTF-8
/// text before handing them to a minifier.
#[derive(PartialEq, Eq, Default, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Code {
  inner: Vec<u8>,
}

impl Code {
  pub fn new(bytes: Vec<u8>) -> Self {
    Self { inner: bytes }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.inner
  }

  pub fn as_str(&self) -> anyhow::Result<&str> {
    str::from_utf8(&self.inner)
      .map_err(|e| anyhow::Error::new(e).context("Failed to convert code to UTF8 str"))
  }

  /// Lossy text view, invalid sequences are replaced with U+FFFD
  pub fn to_text(&self) -> Cow<'_, str> {
    String::from_utf8_lossy(&self.inner)
  }

  pub fn size(&self) -> u32 {
    self.inner.len() as u32
  }
}

impl Display for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.to_text())
  }
}

impl Debug for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}", self.to_text())
  }
}

impl From<String> for Code {
  fn from(value: String) -> Self {
    Self {
      inner: value.into_bytes(),
    }
  }
}

impl From<&str> for Code {
  fn from(value: &str) -> Self {
    Self {
      inner: value.to_owned().into_bytes(),
    }
  }
}

impl From<Vec<u8>> for Code {
  fn from(value: Vec<u8>) -> Self {
    Self { inner: value }
  }
}

/// The content representation of an asset.
///
/// `SourceMapped` carries the original input and input map next to the output
/// so later pipeline stages can keep chaining maps.
#[derive(PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AssetSource {
  Raw {
    code: Code,
  },
  #[serde(rename_all = "camelCase")]
  SourceMapped {
    code: Code,
    map: String,
    original_input: Option<String>,
    original_map: Option<String>,
  },
}

impl AssetSource {
  pub fn raw(code: impl Into<Code>) -> Self {
    AssetSource::Raw { code: code.into() }
  }

  pub fn code(&self) -> &Code {
    match self {
      AssetSource::Raw { code } => code,
      AssetSource::SourceMapped { code, .. } => code,
    }
  }

  pub fn map(&self) -> Option<&str> {
    match self {
      AssetSource::Raw { .. } => None,
      AssetSource::SourceMapped { map, .. } => Some(map),
    }
  }

  /// The combined source and map accessor used when source maps are enabled
  pub fn source_and_map(&self) -> (String, Option<String>) {
    (self.code().to_text().into_owned(), self.map().map(String::from))
  }
}

#[derive(PartialEq, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
  /// Set once the asset has been minified, either by this pass or by an
  /// earlier (e.g. child) build
  #[serde(default)]
  pub minimized: bool,

  #[serde(flatten)]
  pub extra: JSONObject,
}

impl AssetInfo {
  /// Info for a freshly minimized asset, keeping everything the previous info held
  pub fn minimized_from(previous: &AssetInfo) -> Self {
    AssetInfo {
      minimized: true,
      extra: previous.extra.clone(),
    }
  }
}

/// A named, immutable unit of text content owned by the asset store.
///
/// The source is reference counted; the in-process cache tier keys on the
/// identity of that allocation, not on its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Asset {
  pub name: String,
  pub source: Arc<AssetSource>,
  pub info: AssetInfo,
}

impl Asset {
  pub fn new(name: impl Into<String>, source: AssetSource) -> Self {
    Asset {
      name: name.into(),
      source: Arc::new(source),
      info: AssetInfo::default(),
    }
  }
}
