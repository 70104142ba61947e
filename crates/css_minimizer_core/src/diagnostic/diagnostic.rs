use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::types::JSONObject;

/// This is a user facing error or warning emitted by the minimizer.
///
/// The message is already fully formatted, including any generated and
/// original source locations that could be resolved.
#[derive(Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  /// A summary user-facing message
  pub message: String,

  /// Indicates where this diagnostic was emitted from
  pub origin: Option<String>,

  /// Name of the asset the diagnostic relates to
  pub asset: Option<String>,

  /// Hints for the user
  pub hints: Option<Vec<String>>,

  /// Diagnostic specific metadata (optional)
  pub meta: Option<JSONObject>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

impl Diagnostic {
  pub fn new(message: impl Into<String>) -> Self {
    Diagnostic {
      message: message.into(),
      origin: Some(String::from("css-minimizer")),
      ..Diagnostic::default()
    }
  }

  pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
    self.asset = Some(asset.into());
    self
  }
}
