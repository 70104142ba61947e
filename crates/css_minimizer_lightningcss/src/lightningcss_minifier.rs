use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use css_minimizer_core::types::{
  Minifier, MinifierOutput, MinifyError, MinifyInput, RawWarning,
};
use lightningcss::error::{Error as LightningError, ErrorLocation};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap as ParcelSourceMap;

use crate::lightningcss_minifier_config::LightningCssMinifierConfig;

/// Maps are emitted with sources relative to this root
const SOURCE_MAP_ROOT: &str = "/";

/// The lightningcss release this crate is built against, pinned in the
/// workspace manifest. Part of every cache key.
pub const LIGHTNINGCSS_VERSION: &str = "1.0.0-alpha.59";

/// The default minifier, backed by lightningcss
#[derive(Debug, Default)]
pub struct LightningCssMinifier;

impl LightningCssMinifier {
  pub const NAME: &'static str = "lightningcss";

  pub fn new() -> Self {
    LightningCssMinifier
  }
}

/// Positions reported by lightningcss use 0-based lines and 1-based columns
fn position(loc: &ErrorLocation) -> (u32, u32) {
  (loc.line + 1, loc.column.saturating_sub(1))
}

fn to_minify_error<T: std::fmt::Display>(error: &LightningError<T>) -> MinifyError {
  let minify_error = MinifyError::new(error.kind.to_string());
  match &error.loc {
    Some(loc) => {
      let (line, column) = position(loc);
      minify_error.with_position(line, column)
    }
    None => minify_error,
  }
}

fn to_raw_warning<T: std::fmt::Display>(warning: &LightningError<T>) -> RawWarning {
  let (line, column) = warning
    .loc
    .as_ref()
    .map(position)
    .map_or((None, None), |(line, column)| (Some(line), Some(column)));

  RawWarning::Structured {
    message: warning.kind.to_string(),
    line,
    column,
  }
}

#[async_trait]
impl Minifier for LightningCssMinifier {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn version(&self) -> String {
    format!("{}@{}", Self::NAME, LIGHTNINGCSS_VERSION)
  }

  #[tracing::instrument(level = "debug", skip_all, fields(name = %input.name))]
  async fn minify(&self, input: MinifyInput) -> anyhow::Result<MinifierOutput> {
    let config: LightningCssMinifierConfig = if input.options.is_null() {
      LightningCssMinifierConfig::default()
    } else {
      serde_json::from_value(input.options.clone())
        .map_err(|err| anyhow!("Invalid lightningcss minimizer options: {}", err))?
    };

    let browsers = config
      .targets
      .as_ref()
      .map_or_else(|| Ok(None), |targets| Browsers::from_browserslist(targets.queries()))?;

    let targets = Targets {
      browsers,
      include: Default::default(),
      exclude: Default::default(),
    };

    let parser_warnings = Arc::new(RwLock::new(Vec::new()));

    let mut stylesheet = StyleSheet::parse(
      &input.code,
      ParserOptions {
        filename: input.name.clone(),
        css_modules: None,
        source_index: Default::default(),
        error_recovery: config.error_recovery,
        warnings: Some(parser_warnings.clone()),
        flags: ParserFlags::empty(),
      },
    )
    .map_err(|err| to_minify_error(&err))?;

    stylesheet
      .minify(MinifyOptions {
        targets: targets.clone(),
        unused_symbols: config.unused_symbols.iter().cloned().collect(),
      })
      .map_err(|err| to_minify_error(&err))?;

    let mut source_map = if input.source_map {
      let mut source_map = ParcelSourceMap::new(SOURCE_MAP_ROOT);
      source_map.add_source(&input.name);
      source_map.set_source_content(0, &input.code)?;
      Some(source_map)
    } else {
      None
    };

    let css = stylesheet.to_css(PrinterOptions {
      minify: true,
      source_map: source_map.as_mut(),
      project_root: None,
      targets,
      analyze_dependencies: None,
      pseudo_classes: None,
    })?;

    let map = match source_map.as_mut() {
      Some(source_map) => {
        if let Some(input_map) = &input.input_map {
          // An unreadable previous map is not fatal, the output map then
          // points at the asset instead of its original sources.
          match ParcelSourceMap::from_json(SOURCE_MAP_ROOT, input_map) {
            Ok(mut original_map) => source_map.extends(&mut original_map)?,
            Err(err) => {
              tracing::warn!(name = %input.name, "Unable to chain input source map: {}", err)
            }
          }
        }

        Some(source_map.to_json(None)?)
      }
      None => None,
    };

    let warnings = match parser_warnings.read() {
      Ok(warnings) => warnings.iter().map(to_raw_warning).collect(),
      Err(_) => Vec::new(),
    };

    Ok(MinifierOutput {
      code: css.code,
      map,
      warnings,
    })
  }
}
