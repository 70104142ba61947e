use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use css_minimizer_core::types::RawWarning;
use css_minimizer_lightningcss::LightningCssMinifier;
use serde::Deserialize;
use serde_json::Value;

use crate::rules::{MatchRules, Rules};
use crate::worker::WorkerCommand;

/// Key material of a persistent cache entry
pub type CacheKeys = BTreeMap<String, Value>;

/// `(warning, asset name, resolved original source) -> keep`
pub type WarningsFilter = Arc<dyn Fn(&RawWarning, &str, Option<&str>) -> bool + Send + Sync>;

/// Extends the default cache key material of an asset
pub type CacheKeysFn = Arc<dyn Fn(CacheKeys, &str) -> CacheKeys + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SourceMapConfig")]
pub enum SourceMapMode {
  #[default]
  Disabled,
  /// Maps are carried on the committed source
  External,
  /// Maps are carried on the source and embedded as a data url comment
  Inline,
}

impl SourceMapMode {
  pub fn is_enabled(&self) -> bool {
    !matches!(self, SourceMapMode::Disabled)
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceMapConfig {
  Enabled(bool),
  Object {
    #[serde(default)]
    inline: bool,
  },
}

impl From<SourceMapConfig> for SourceMapMode {
  fn from(value: SourceMapConfig) -> Self {
    match value {
      SourceMapConfig::Enabled(false) => SourceMapMode::Disabled,
      SourceMapConfig::Enabled(true) | SourceMapConfig::Object { inline: false } => {
        SourceMapMode::External
      }
      SourceMapConfig::Object { inline: true } => SourceMapMode::Inline,
    }
  }
}

/// Requested worker parallelism
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ParallelConfig")]
pub enum Parallelism {
  /// Everything runs inline
  Disabled,
  /// One worker per available core, minus one for the host
  #[default]
  Auto,
  /// At most this many workers, capped like `Auto`
  Workers(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParallelConfig {
  Enabled(bool),
  Workers(usize),
}

impl From<ParallelConfig> for Parallelism {
  fn from(value: ParallelConfig) -> Self {
    match value {
      ParallelConfig::Enabled(false) | ParallelConfig::Workers(0) => Parallelism::Disabled,
      ParallelConfig::Enabled(true) => Parallelism::Auto,
      ParallelConfig::Workers(count) => Parallelism::Workers(count),
    }
  }
}

/// Where persistent cache entries are stored
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "CacheConfig")]
pub enum CacheOption {
  #[default]
  Disabled,
  /// `node_modules/.cache/css-minimizer` under the context directory
  Default,
  Directory(PathBuf),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CacheConfig {
  Enabled(bool),
  Directory(PathBuf),
}

impl From<CacheConfig> for CacheOption {
  fn from(value: CacheConfig) -> Self {
    match value {
      CacheConfig::Enabled(false) => CacheOption::Disabled,
      CacheConfig::Enabled(true) => CacheOption::Default,
      CacheConfig::Directory(path) => CacheOption::Directory(path),
    }
  }
}

impl CacheOption {
  pub fn directory(&self, context: &Path) -> Option<PathBuf> {
    match self {
      CacheOption::Disabled => None,
      CacheOption::Default => Some(context.join("node_modules/.cache/css-minimizer")),
      CacheOption::Directory(path) if path.is_relative() => Some(context.join(path)),
      CacheOption::Directory(path) => Some(path.clone()),
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
  fn from(value: OneOrMany<T>) -> Self {
    match value {
      OneOrMany::One(value) => vec![value],
      OneOrMany::Many(values) => values,
    }
  }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: serde::Deserializer<'de>,
  T: Deserialize<'de>,
{
  OneOrMany::deserialize(deserializer).map(Vec::from)
}

fn default_minify() -> Vec<String> {
  vec![String::from(LightningCssMinifier::NAME)]
}

/// Configuration of the plugin.
///
/// The data part loads from JSON with camelCase keys, the hooks can only be
/// set programmatically.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CssMinimizerOptions {
  pub test: Rules,
  pub include: Option<Rules>,
  pub exclude: Option<Rules>,
  pub source_map: SourceMapMode,
  pub cache: CacheOption,
  pub parallel: Parallelism,
  /// Names of registered minifiers, applied in sequence
  #[serde(deserialize_with = "one_or_many")]
  pub minify: Vec<String>,
  /// One options object shared by every minifier, or one per minifier
  #[serde(deserialize_with = "one_or_many")]
  pub minimizer_options: Vec<Value>,
  /// Directory paths in diagnostics are shortened against
  pub context: PathBuf,
  #[serde(skip)]
  pub warnings_filter: Option<WarningsFilter>,
  #[serde(skip)]
  pub cache_keys: Option<CacheKeysFn>,
  #[serde(skip)]
  pub worker_command: Option<WorkerCommand>,
}

impl Default for CssMinimizerOptions {
  fn default() -> Self {
    CssMinimizerOptions {
      test: Rules::default(),
      include: None,
      exclude: None,
      source_map: SourceMapMode::default(),
      cache: CacheOption::default(),
      parallel: Parallelism::default(),
      minify: default_minify(),
      minimizer_options: Vec::new(),
      context: PathBuf::new(),
      warnings_filter: None,
      cache_keys: None,
      worker_command: None,
    }
  }
}

impl Debug for CssMinimizerOptions {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CssMinimizerOptions")
      .field("test", &self.test)
      .field("include", &self.include)
      .field("exclude", &self.exclude)
      .field("source_map", &self.source_map)
      .field("cache", &self.cache)
      .field("parallel", &self.parallel)
      .field("minify", &self.minify)
      .field("minimizer_options", &self.minimizer_options)
      .field("context", &self.context)
      .field("warnings_filter", &self.warnings_filter.is_some())
      .field("cache_keys", &self.cache_keys.is_some())
      .field("worker_command", &self.worker_command)
      .finish()
  }
}

impl CssMinimizerOptions {
  pub fn from_json(json: &str) -> anyhow::Result<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn match_rules(&self) -> MatchRules {
    MatchRules {
      test: self.test.clone(),
      include: self.include.clone(),
      exclude: self.exclude.clone(),
    }
  }

  /// The options passed to the minifier at `index` in the chain
  pub fn minimizer_options_for(&self, index: usize) -> Value {
    match self.minimizer_options.as_slice() {
      [] => Value::Null,
      [shared] => shared.clone(),
      options => options.get(index).cloned().unwrap_or(Value::Null),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn defaults_match_css_and_use_lightningcss() {
    let options = CssMinimizerOptions::default();

    assert!(options.match_rules().is_match("main.css"));
    assert_eq!(options.minify, vec!["lightningcss"]);
    assert_eq!(options.parallel, Parallelism::Auto);
    assert_eq!(options.source_map, SourceMapMode::Disabled);
    assert_eq!(options.cache, CacheOption::Disabled);
  }

  #[test]
  fn parses_json_configuration() {
    let options = CssMinimizerOptions::from_json(
      r#"{
        "include": ["a", {"regex": "^vendor/"}],
        "exclude": "skip",
        "sourceMap": {"inline": true},
        "cache": ".cache/css",
        "parallel": 2,
        "minify": "lightningcss",
        "minimizerOptions": {"targets": "defaults"}
      }"#,
    )
    .unwrap();

    assert_eq!(options.source_map, SourceMapMode::Inline);
    assert_eq!(options.parallel, Parallelism::Workers(2));
    assert_eq!(
      options.cache.directory(Path::new("/project")),
      Some(PathBuf::from("/project/.cache/css"))
    );
    assert_eq!(options.minify, vec!["lightningcss"]);
    assert_eq!(options.minimizer_options_for(0), json!({"targets": "defaults"}));

    let rules = options.match_rules();
    assert!(rules.is_match("a.css"));
    assert!(rules.is_match("vendor/x.css"));
    assert!(!rules.is_match("b.css"));
    assert!(!rules.is_match("skip/a.css"));
  }

  #[test]
  fn parses_boolean_shapes() {
    let options =
      CssMinimizerOptions::from_json(r#"{"sourceMap": true, "cache": true, "parallel": false}"#)
        .unwrap();

    assert_eq!(options.source_map, SourceMapMode::External);
    assert_eq!(options.cache, CacheOption::Default);
    assert_eq!(options.parallel, Parallelism::Disabled);

    let options = CssMinimizerOptions::from_json(r#"{"parallel": 0}"#).unwrap();
    assert_eq!(options.parallel, Parallelism::Disabled);
  }

  #[test]
  fn minimizer_options_can_be_per_minifier() {
    let options = CssMinimizerOptions {
      minimizer_options: vec![json!({"a": 1}), json!({"b": 2})],
      ..CssMinimizerOptions::default()
    };

    assert_eq!(options.minimizer_options_for(1), json!({"b": 2}));
    assert_eq!(options.minimizer_options_for(2), Value::Null);
  }
}
