use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub type MinifierRef = Arc<dyn Minifier>;

/// Everything a minifier receives for one asset.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyInput {
  /// Name of the asset, used as the source name in produced maps
  pub name: String,
  pub code: String,
  /// The map of the previous stage; output maps must be chained onto it
  pub input_map: Option<String>,
  /// Whether an output map was requested
  pub source_map: bool,
  /// Opaque, minifier specific configuration
  pub options: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifierOutput {
  pub code: String,
  pub map: Option<String>,
  #[serde(default)]
  pub warnings: Vec<RawWarning>,
}

/// A warning as reported by a minifier.
///
/// Positions, when present, are 1-based lines and 0-based columns in the
/// generated output.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawWarning {
  Message(String),
  Structured {
    message: String,
    line: Option<u32>,
    column: Option<u32>,
  },
}

impl RawWarning {
  pub fn message(&self) -> &str {
    match self {
      RawWarning::Message(message) => message,
      RawWarning::Structured { message, .. } => message,
    }
  }
}

impl Display for RawWarning {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.message())
  }
}

impl From<&str> for RawWarning {
  fn from(value: &str) -> Self {
    RawWarning::Message(value.to_string())
  }
}

/// An error reported by a minifier.
///
/// Minifiers may return this from `minify` to attach a generated position,
/// any other error is converted with its message only.
#[derive(Error, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct MinifyError {
  pub message: String,
  pub line: Option<u32>,
  pub column: Option<u32>,
  pub stack: Option<String>,
}

impl MinifyError {
  pub fn new(message: impl Into<String>) -> Self {
    MinifyError {
      message: message.into(),
      ..MinifyError::default()
    }
  }

  pub fn with_position(mut self, line: u32, column: u32) -> Self {
    self.line = Some(line);
    self.column = Some(column);
    self
  }

  pub fn from_anyhow(error: anyhow::Error) -> Self {
    match error.downcast::<MinifyError>() {
      Ok(error) => error,
      Err(error) => MinifyError::new(format!("{:#}", error)),
    }
  }
}

/// The outcome of minifying one asset.
///
/// A result carrying `error` is a failure regardless of its other fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyResult {
  pub code: String,
  pub map: Option<String>,
  #[serde(default)]
  pub warnings: Vec<RawWarning>,
  pub error: Option<MinifyError>,
}

impl MinifyResult {
  pub fn failure(error: MinifyError) -> Self {
    MinifyResult {
      error: Some(error),
      ..MinifyResult::default()
    }
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

impl From<MinifierOutput> for MinifyResult {
  fn from(output: MinifierOutput) -> Self {
    MinifyResult {
      code: output.code,
      map: output.map,
      warnings: output.warnings,
      error: None,
    }
  }
}

/// A pluggable CSS minifier backend.
///
/// Minifiers are black boxes with a fixed contract: text and an optional input
/// map in, minified text, an optional chained output map and warnings out.
#[async_trait]
pub trait Minifier: Debug + Send + Sync {
  /// Identifier used to reference the minifier across process boundaries
  fn name(&self) -> &str;

  /// Version token, part of the persistent cache identity
  fn version(&self) -> String;

  /// Whether the minifier can run on a worker thread. Backends holding
  /// handles that cannot be shared between threads return `false` and are
  /// run in worker processes instead.
  fn supports_worker_threads(&self) -> bool {
    true
  }

  async fn minify(&self, input: MinifyInput) -> anyhow::Result<MinifierOutput>;
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn warnings_deserialize_from_strings_and_objects() {
    let warnings: Vec<RawWarning> =
      serde_json::from_value(json!(["plain", {"message": "at", "line": 2, "column": 4}])).unwrap();

    assert_eq!(
      warnings,
      vec![
        RawWarning::Message("plain".into()),
        RawWarning::Structured {
          message: "at".into(),
          line: Some(2),
          column: Some(4),
        }
      ]
    );
  }

  #[test]
  fn structured_errors_survive_anyhow() {
    let error = anyhow::Error::new(MinifyError::new("Unexpected token").with_position(3, 1));

    assert_eq!(
      MinifyError::from_anyhow(error),
      MinifyError {
        message: "Unexpected token".into(),
        line: Some(3),
        column: Some(1),
        stack: None,
      }
    );
  }

  #[test]
  fn other_errors_keep_their_context_chain() {
    let error = anyhow::anyhow!("inner").context("outer");

    assert_eq!(MinifyError::from_anyhow(error).message, "outer: inner");
  }
}
