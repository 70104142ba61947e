use std::sync::Arc;

use css_minimizer_core::source_map::{inline_source_map_comment, is_valid_source_map};
use css_minimizer_core::types::{Asset, AssetInfo, AssetSource};

use crate::cache::{CacheKeyBuilder, CachedResult};
use crate::minify::{MinifierStage, MinifyRequest};
use crate::options::SourceMapMode;

/// The minification of one asset.
///
/// A task is created for every asset that passes the match rules and is not
/// minimized yet. It keeps the asset's original source for the in-memory
/// cache tier and the input handed to the minifier chain.
#[derive(Clone, Debug)]
pub struct Task {
  pub name: String,
  pub source: Arc<AssetSource>,
  pub info: AssetInfo,
  pub input: String,
  pub input_map: Option<String>,
  /// Set when the asset carried a map that is not a valid source map
  pub invalid_input_map: bool,
  pub cache_identity: String,
}

impl Task {
  pub fn new(asset: Asset, source_map: SourceMapMode, cache_keys: &CacheKeyBuilder) -> Self {
    let (input, input_map) = if source_map.is_enabled() {
      asset.source.source_and_map()
    } else {
      (asset.source.code().to_text().into_owned(), None)
    };

    let invalid_input_map = input_map
      .as_deref()
      .is_some_and(|map| !is_valid_source_map(map));

    let cache_identity = cache_keys.identity(&asset.name, &input, input_map.as_deref());

    Task {
      name: asset.name,
      source: asset.source,
      info: asset.info,
      input,
      input_map,
      invalid_input_map,
      cache_identity,
    }
  }

  pub fn request(&self, stages: &[MinifierStage], source_map: SourceMapMode) -> MinifyRequest {
    MinifyRequest {
      name: self.name.clone(),
      code: self.input.clone(),
      input_map: self.input_map.clone(),
      source_map: source_map.is_enabled(),
      stages: stages.to_vec(),
    }
  }

  /// The content committed for a successful result.
  ///
  /// Produces the same representation whether the result was just computed
  /// or read from a cache.
  pub fn output(&self, result: &CachedResult, source_map: SourceMapMode) -> AssetSource {
    match (&result.map, source_map) {
      (Some(map), SourceMapMode::External | SourceMapMode::Inline) => {
        let code = match source_map {
          SourceMapMode::Inline => format!("{}\n{}", result.code, inline_source_map_comment(map)),
          _ => result.code.clone(),
        };

        AssetSource::SourceMapped {
          code: code.into(),
          map: map.clone(),
          original_input: Some(self.input.clone()),
          original_map: self.input_map.clone(),
        }
      }
      _ => AssetSource::raw(result.code.clone()),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn keys(source_map: SourceMapMode) -> CacheKeyBuilder {
    CacheKeyBuilder::new(&[], &[], source_map, None)
  }

  fn mapped_asset(map: &str) -> Asset {
    Asset::new(
      "a.css",
      AssetSource::SourceMapped {
        code: "a { }".into(),
        map: map.into(),
        original_input: None,
        original_map: None,
      },
    )
  }

  const MAP: &str = r#"{"version":3,"sources":["a.scss"],"names":[],"mappings":"AAAA"}"#;

  #[test]
  fn ignores_input_maps_when_source_maps_are_disabled() {
    let task = Task::new(
      mapped_asset(MAP),
      SourceMapMode::Disabled,
      &keys(SourceMapMode::Disabled),
    );

    assert_eq!(task.input, "a { }");
    assert_eq!(task.input_map, None);
  }

  #[test]
  fn flags_invalid_input_maps_but_keeps_them() {
    let task = Task::new(
      mapped_asset(r#"{"version":"3"}"#),
      SourceMapMode::External,
      &keys(SourceMapMode::External),
    );

    assert!(task.invalid_input_map);
    assert_eq!(task.input_map.as_deref(), Some(r#"{"version":"3"}"#));
  }

  #[test]
  fn builds_source_mapped_outputs() {
    let task = Task::new(
      mapped_asset(MAP),
      SourceMapMode::External,
      &keys(SourceMapMode::External),
    );
    let result = CachedResult {
      code: String::from("a{}"),
      map: Some(String::from(MAP)),
      warnings: Vec::new(),
    };

    assert_eq!(
      task.output(&result, SourceMapMode::External),
      AssetSource::SourceMapped {
        code: "a{}".into(),
        map: MAP.into(),
        original_input: Some(String::from("a { }")),
        original_map: Some(String::from(MAP)),
      }
    );
  }

  #[test]
  fn inline_outputs_embed_the_map() {
    let task = Task::new(
      Asset::new("a.css", AssetSource::raw("a { }")),
      SourceMapMode::Inline,
      &keys(SourceMapMode::Inline),
    );
    let result = CachedResult {
      code: String::from("a{}"),
      map: Some(String::from(MAP)),
      warnings: Vec::new(),
    };

    let output = task.output(&result, SourceMapMode::Inline);
    let code = output.code().to_text();

    assert!(code.starts_with(
      "a{}\n/*# sourceMappingURL=data:application/json;charset=utf-8;base64,"
    ));
    assert_eq!(output.map(), Some(MAP));
  }

  #[test]
  fn plain_results_are_raw() {
    let task = Task::new(
      Asset::new("a.css", AssetSource::raw("a { }")),
      SourceMapMode::Disabled,
      &keys(SourceMapMode::Disabled),
    );

    let output = task.output(
      &CachedResult {
        code: String::from("a{}"),
        ..CachedResult::default()
      },
      SourceMapMode::Disabled,
    );

    assert_eq!(output, AssetSource::raw("a{}"));
    assert_eq!(
      task.request(&[], SourceMapMode::Disabled).input_map,
      Option::<String>::None
    );
  }
}
