use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

/// Structural check of a raw JSON source map.
///
/// A map is considered valid when it has a numeric `version`, a `sources`
/// array and a `mappings` string. Invalid maps are still passed along, callers
/// only use this to warn about them.
pub fn is_valid_source_map(raw: &str) -> bool {
  let Ok(value) = serde_json::from_str::<Value>(raw) else {
    return false;
  };

  value.get("version").is_some_and(Value::is_number)
    && value.get("sources").is_some_and(Value::is_array)
    && value.get("mappings").is_some_and(Value::is_string)
}

/// The `sourceMappingURL` comment embedding `map` as a base64 data url
pub fn inline_source_map_comment(map: &str) -> String {
  format!(
    "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,{} */",
    STANDARD.encode(map)
  )
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn accepts_well_formed_maps() {
    assert!(is_valid_source_map(
      r#"{"version":3,"sources":["a.css"],"names":[],"mappings":"AAAA"}"#
    ));
  }

  #[test]
  fn rejects_structurally_invalid_maps() {
    assert!(!is_valid_source_map("not json"));
    assert!(!is_valid_source_map(r#"{"sources":[],"mappings":""}"#));
    assert!(!is_valid_source_map(r#"{"version":3,"sources":"a","mappings":""}"#));
    assert!(!is_valid_source_map(r#"{"version":3,"sources":[],"mappings":5}"#));
  }

  #[test]
  fn inlines_maps_as_data_urls() {
    assert_eq!(
      inline_source_map_comment("{}"),
      "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,e30= */"
    );
  }
}
