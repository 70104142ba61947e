use std::path::{Path, PathBuf};
use std::sync::Arc;

use css_minimizer_core::diagnostic::Diagnostic;
use css_minimizer_core::source_map::is_valid_source_map;
use css_minimizer_core::types::{MinifyError, RawWarning};
use parcel_sourcemap::SourceMap as ParcelSourceMap;
use regex::Regex;

use crate::options::WarningsFilter;

/// Renders paths for display in diagnostics
pub trait RequestShortener: Send + Sync {
  fn shorten(&self, request: &str) -> String;
}

/// Makes absolute paths relative to a context directory
#[derive(Clone, Debug)]
pub struct ContextShortener {
  context: PathBuf,
}

impl ContextShortener {
  pub fn new(context: impl Into<PathBuf>) -> Self {
    ContextShortener {
      context: context.into(),
    }
  }
}

impl RequestShortener for ContextShortener {
  fn shorten(&self, request: &str) -> String {
    let path = Path::new(request);
    if !path.is_absolute() || self.context.as_os_str().is_empty() {
      return request.to_string();
    }

    pathdiff::diff_paths(path, &self.context)
      .map(|relative| relative.display().to_string())
      .unwrap_or_else(|| request.to_string())
  }
}

/// A position in the minifier input, 1-based line and 0-based column
#[derive(Clone, Debug, PartialEq)]
struct GeneratedPosition {
  file: String,
  line: u32,
  column: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct OriginalPosition {
  source: String,
  line: u32,
  column: u32,
}

/// Turns minifier errors and warnings into user facing diagnostics.
///
/// Positions reported by a minifier refer to the code it was given. When the
/// asset came with a valid source map they are resolved to the original
/// source, and the message then names both locations.
pub struct DiagnosticsTranslator {
  position: Regex,
  shortener: Option<Arc<dyn RequestShortener>>,
  warnings_filter: Option<WarningsFilter>,
}

impl DiagnosticsTranslator {
  pub fn new(
    shortener: Option<Arc<dyn RequestShortener>>,
    warnings_filter: Option<WarningsFilter>,
  ) -> Self {
    DiagnosticsTranslator {
      position: Regex::new(r"\s(\S+):(\d+):(\d+)").expect("static position pattern is valid"),
      shortener,
      warnings_filter,
    }
  }

  fn shorten(&self, request: &str) -> String {
    match &self.shortener {
      Some(shortener) => shortener.shorten(request),
      None => request.to_string(),
    }
  }

  /// Resolves a generated position against the source map.
  ///
  /// Positions that resolve to the asset itself are not interesting and are
  /// treated as unresolved.
  fn resolve(
    &self,
    asset: &str,
    source_map: Option<&str>,
    position: &GeneratedPosition,
  ) -> Option<OriginalPosition> {
    let raw = source_map.filter(|raw| is_valid_source_map(raw))?;
    let mut source_map = ParcelSourceMap::from_json("/", raw).ok()?;

    let mapping =
      source_map.find_closest_mapping(position.line.checked_sub(1)?, position.column)?;
    let original = mapping.original?;
    let source = source_map.get_source(original.source).ok()?.to_string();

    if source.is_empty() || source == asset {
      return None;
    }

    Some(OriginalPosition {
      source,
      line: original.original_line + 1,
      column: original.original_column,
    })
  }

  fn format(
    &self,
    asset: &str,
    message: &str,
    generated: Option<&GeneratedPosition>,
    original: Option<&OriginalPosition>,
  ) -> String {
    let mut formatted = format!("{} from Css Minimizer plugin\n{}", asset, message);

    if let Some(original) = original {
      formatted.push_str(&format!(
        " [{}:{},{}]",
        self.shorten(&original.source),
        original.line,
        original.column
      ));
    }

    if let Some(generated) = generated {
      let separator = if original.is_some() { "" } else { " " };
      formatted.push_str(&format!(
        "{}[{}:{},{}]",
        separator, generated.file, generated.line, generated.column
      ));
    }

    formatted
  }

  /// Builds the error diagnostic of a failed task. Errors are never filtered.
  pub fn build_error(
    &self,
    error: &MinifyError,
    asset: &str,
    source_map: Option<&str>,
  ) -> Diagnostic {
    let generated = match (error.line, error.column) {
      (Some(line), column) => Some(GeneratedPosition {
        file: asset.to_string(),
        line,
        column: column.unwrap_or(0),
      }),
      _ => None,
    };

    let original = generated
      .as_ref()
      .and_then(|generated| self.resolve(asset, source_map, generated));

    let mut message = self.format(
      asset,
      &error.message,
      generated.as_ref(),
      original.as_ref(),
    );

    if let Some(stack) = &error.stack {
      let frames = stack.lines().skip(1).collect::<Vec<_>>();
      if !frames.is_empty() {
        message.push('\n');
        message.push_str(&frames.join("\n"));
      }
    }

    Diagnostic::new(message).with_asset(asset)
  }

  /// Builds a warning diagnostic, or `None` when the warnings filter drops it
  pub fn build_warning(
    &self,
    warning: &RawWarning,
    asset: &str,
    source_map: Option<&str>,
  ) -> Option<Diagnostic> {
    let (message, generated) = match warning {
      RawWarning::Structured {
        message,
        line: Some(line),
        column,
      } => (
        message.clone(),
        Some(GeneratedPosition {
          file: asset.to_string(),
          line: *line,
          column: column.unwrap_or(0),
        }),
      ),
      RawWarning::Structured { message, .. } => (message.clone(), None),
      RawWarning::Message(message) => self.parse_position(message, asset),
    };

    let original = generated
      .as_ref()
      .and_then(|generated| self.resolve(asset, source_map, generated));

    if let Some(filter) = &self.warnings_filter {
      let source = original.as_ref().map(|original| original.source.as_str());
      if !filter(warning, asset, source) {
        return None;
      }
    }

    let message = self.format(asset, &message, generated.as_ref(), original.as_ref());

    Some(Diagnostic::new(message).with_asset(asset))
  }

  /// Splits a `message file:line:column` warning into its message and position.
  ///
  /// The position always refers to the minified asset. Assets with identical
  /// content share cached warnings, so the file named in the text may be
  /// another asset's.
  fn parse_position(&self, message: &str, asset: &str) -> (String, Option<GeneratedPosition>) {
    let Some(captures) = self.position.captures(message) else {
      return (message.to_string(), None);
    };

    let line = captures[2].parse::<u32>().ok();
    let column = captures[3].parse::<u32>().ok();

    match (line, column) {
      (Some(line), Some(column)) => (
        self.position.replace(message, "").trim().to_string(),
        Some(GeneratedPosition {
          file: asset.to_string(),
          line,
          column,
        }),
      ),
      _ => (message.to_string(), None),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  const SOURCE_MAP: &str = r#"{"version":3,"sources":["one.css"],"names":[],"mappings":"CAAK"}"#;

  fn translator(warnings_filter: Option<WarningsFilter>) -> DiagnosticsTranslator {
    DiagnosticsTranslator::new(
      Some(Arc::new(ContextShortener::new("/project"))),
      warnings_filter,
    )
  }

  #[test]
  fn resolves_warnings_to_original_sources() {
    let diagnostic = translator(None)
      .build_warning(
        &RawWarning::from("Warning test.css:1:1"),
        "test.css",
        Some(SOURCE_MAP),
      )
      .unwrap();

    assert!(diagnostic
      .message
      .starts_with("test.css from Css Minimizer plugin\nWarning ["));
    assert!(diagnostic.message.contains("one.css:1,5]"));
    assert!(diagnostic.message.ends_with("[test.css:1,1]"));
    assert_eq!(diagnostic.asset.as_deref(), Some("test.css"));
  }

  #[test]
  fn filtered_warnings_are_dropped() {
    let filter: WarningsFilter =
      Arc::new(|_warning: &RawWarning, asset: &str, _source: Option<&str>| {
        !asset.contains("test")
      });

    let diagnostic = translator(Some(filter)).build_warning(
      &RawWarning::from("Warning test.css:1:1"),
      "test.css",
      Some(SOURCE_MAP),
    );

    assert_eq!(diagnostic, None);
  }

  #[test]
  fn filters_receive_the_resolved_source() {
    let filter: WarningsFilter =
      Arc::new(|_warning: &RawWarning, _asset: &str, source: Option<&str>| {
        !source.is_some_and(|source| source.ends_with("one.css"))
      });

    let diagnostic = translator(Some(filter)).build_warning(
      &RawWarning::Structured {
        message: String::from("Unknown property"),
        line: Some(1),
        column: Some(1),
      },
      "main.css",
      Some(SOURCE_MAP),
    );

    assert_eq!(diagnostic, None);
  }

  #[test]
  fn errors_are_never_filtered() {
    let filter: WarningsFilter = Arc::new(|_: &RawWarning, _: &str, _: Option<&str>| false);
    let error = MinifyError::new("Unexpected token").with_position(1, 1);

    let diagnostic = translator(Some(filter)).build_error(&error, "test.css", Some(SOURCE_MAP));

    assert!(diagnostic.message.contains("one.css:1,5][test.css:1,1]"));
  }

  #[test]
  fn shared_warnings_point_at_the_reported_asset() {
    let diagnostic = translator(None)
      .build_warning(&RawWarning::from("Unknown at rule a.css:1:1"), "b.css", None)
      .unwrap();

    assert_eq!(
      diagnostic.message,
      "b.css from Css Minimizer plugin\nUnknown at rule [b.css:1,1]"
    );
  }

  #[test]
  fn unresolvable_positions_fall_back_to_generated_positions() {
    let error = MinifyError::new("Unexpected token").with_position(7, 3);

    let diagnostic = translator(None).build_error(&error, "test.css", Some(SOURCE_MAP));

    assert_eq!(
      diagnostic.message,
      "test.css from Css Minimizer plugin\nUnexpected token [test.css:7,3]"
    );
  }

  #[test]
  fn invalid_maps_fall_back_to_generated_positions() {
    let error = MinifyError::new("Unexpected token").with_position(1, 1);

    let diagnostic = translator(None).build_error(&error, "test.css", Some("{\"version\":3}"));

    assert_eq!(
      diagnostic.message,
      "test.css from Css Minimizer plugin\nUnexpected token [test.css:1,1]"
    );
  }

  #[test]
  fn errors_without_positions_keep_the_raw_message() {
    let error = MinifyError {
      stack: Some(String::from("Error: boom\n    at minify (minifier.rs:1:1)")),
      ..MinifyError::new("boom")
    };

    let diagnostic = translator(None).build_error(&error, "test.css", None);

    assert_eq!(
      diagnostic.message,
      "test.css from Css Minimizer plugin\nboom\n    at minify (minifier.rs:1:1)"
    );
  }

  #[test]
  fn shortens_absolute_sources_against_the_context() {
    let shortener = ContextShortener::new("/project");

    assert_eq!(shortener.shorten("/project/src/one.css"), "src/one.css");
    assert_eq!(shortener.shorten("one.css"), "one.css");
  }
}
