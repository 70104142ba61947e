use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Browserslist {
  String(String),
  List(Vec<String>),
}

impl Browserslist {
  pub fn queries(&self) -> Vec<String> {
    match self {
      Browserslist::String(query) => vec![query.clone()],
      Browserslist::List(queries) => queries.clone(),
    }
  }
}

/// Options accepted through `minimizerOptions` for the lightningcss backend
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LightningCssMinifierConfig {
  pub targets: Option<Browserslist>,
  /// Skip invalid rules and report them as warnings instead of failing
  #[serde(default)]
  pub error_recovery: bool,
  /// Class names, ids and other symbols known to be unused
  #[serde(default)]
  pub unused_symbols: Vec<String>,
}
