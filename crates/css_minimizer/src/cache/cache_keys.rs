use css_minimizer_core::hash::hash_string;
use css_minimizer_core::types::MinifierRef;
use css_minimizer_core::version::css_minimizer_version;
use serde_json::{json, Value};

use crate::minify::MinifierStage;
use crate::options::{CacheKeys, CacheKeysFn, SourceMapMode};

/// Computes the persistent cache identity of an asset.
///
/// The identity covers the tool version, the version and options of every
/// minifier in the chain, the source map mode and hashes of the input code
/// and map. The asset name is only part of it when source maps are enabled,
/// since it then ends up in the output map.
pub struct CacheKeyBuilder {
  base: CacheKeys,
  include_name: bool,
  extend: Option<CacheKeysFn>,
}

impl CacheKeyBuilder {
  pub fn new(
    minifiers: &[MinifierRef],
    stages: &[MinifierStage],
    source_map: SourceMapMode,
    extend: Option<CacheKeysFn>,
  ) -> Self {
    let mut base = CacheKeys::new();
    base.insert(
      String::from("css-minimizer"),
      json!(css_minimizer_version()),
    );
    base.insert(
      String::from("minifiers"),
      Value::from(
        minifiers
          .iter()
          .map(|minifier| minifier.version())
          .collect::<Vec<_>>(),
      ),
    );
    base.insert(
      String::from("minimizerOptions"),
      Value::from(
        stages
          .iter()
          .map(|stage| stage.options.clone())
          .collect::<Vec<_>>(),
      ),
    );
    base.insert(
      String::from("sourceMap"),
      json!(match source_map {
        SourceMapMode::Disabled => "disabled",
        SourceMapMode::External => "external",
        SourceMapMode::Inline => "inline",
      }),
    );

    CacheKeyBuilder {
      base,
      include_name: source_map.is_enabled(),
      extend,
    }
  }

  pub fn keys(&self, name: &str, input: &str, input_map: Option<&str>) -> CacheKeys {
    let mut keys = self.base.clone();
    keys.insert(String::from("contentHash"), json!(hash_string(input)));
    keys.insert(
      String::from("inputMapHash"),
      json!(input_map.map(hash_string)),
    );

    if self.include_name {
      keys.insert(String::from("name"), json!(name));
    }

    match &self.extend {
      Some(extend) => extend(keys, name),
      None => keys,
    }
  }

  pub fn identity(&self, name: &str, input: &str, input_map: Option<&str>) -> String {
    let keys = self.keys(name, input, input_map);
    hash_string(&Value::Object(keys.into_iter().collect()).to_string())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use css_minimizer_lightningcss::LightningCssMinifier;
  use pretty_assertions::{assert_eq, assert_ne};

  use super::*;

  fn builder(source_map: SourceMapMode, extend: Option<CacheKeysFn>) -> CacheKeyBuilder {
    let minifier: MinifierRef = Arc::new(LightningCssMinifier::new());
    CacheKeyBuilder::new(
      &[minifier],
      &[MinifierStage {
        minifier: String::from("lightningcss"),
        options: Value::Null,
      }],
      source_map,
      extend,
    )
  }

  #[test]
  fn identical_content_shares_an_identity() {
    let builder = builder(SourceMapMode::Disabled, None);

    assert_eq!(
      builder.identity("a.css", "a{}", None),
      builder.identity("b.css", "a{}", None)
    );
    assert_ne!(
      builder.identity("a.css", "a{}", None),
      builder.identity("a.css", "b{}", None)
    );
    assert_ne!(
      builder.identity("a.css", "a{}", None),
      builder.identity("a.css", "a{}", Some("{}"))
    );
  }

  #[test]
  fn source_mapped_identities_include_the_name() {
    let builder = builder(SourceMapMode::External, None);

    assert_ne!(
      builder.identity("a.css", "a{}", None),
      builder.identity("b.css", "a{}", None)
    );
  }

  #[test]
  fn extension_function_changes_the_identity() {
    let plain = builder(SourceMapMode::Disabled, None);
    let extended = builder(
      SourceMapMode::Disabled,
      Some(Arc::new(|mut keys: CacheKeys, name: &str| {
        keys.insert(String::from("custom"), json!(name.len()));
        keys
      })),
    );

    assert_eq!(
      extended.keys("a.css", "a{}", None).get("custom"),
      Some(&json!(5))
    );
    assert_ne!(
      plain.identity("a.css", "a{}", None),
      extended.identity("a.css", "a{}", None)
    );
  }
}
