use regex::Regex;
use serde::Deserialize;

/// A single asset name pattern
#[derive(Clone, Debug)]
pub enum Rule {
  /// Matches when the asset name contains the string
  Substring(String),
  Regex(Regex),
}

impl Rule {
  pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
    Ok(Rule::Regex(Regex::new(pattern)?))
  }

  pub fn is_match(&self, name: &str) -> bool {
    match self {
      Rule::Substring(pattern) => name.contains(pattern.as_str()),
      Rule::Regex(regex) => regex.is_match(name),
    }
  }
}

impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Rule::Substring(a), Rule::Substring(b)) => a == b,
      (Rule::Regex(a), Rule::Regex(b)) => a.as_str() == b.as_str(),
      _ => false,
    }
  }
}

impl From<&str> for Rule {
  fn from(value: &str) -> Self {
    Rule::Substring(value.to_string())
  }
}

impl From<Regex> for Rule {
  fn from(value: Regex) -> Self {
    Rule::Regex(value)
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleConfig {
  Substring(String),
  Regex {
    regex: String,
    #[serde(default)]
    flags: String,
  },
}

impl TryFrom<RuleConfig> for Rule {
  type Error = regex::Error;

  fn try_from(value: RuleConfig) -> Result<Self, Self::Error> {
    match value {
      RuleConfig::Substring(pattern) => Ok(Rule::Substring(pattern)),
      RuleConfig::Regex { regex, flags } if flags.is_empty() => Rule::regex(&regex),
      RuleConfig::Regex { regex, flags } => Rule::regex(&format!("(?{flags}){regex}")),
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesConfig {
  One(RuleConfig),
  Many(Vec<RuleConfig>),
}

/// One pattern or a list of patterns, matching when any of them matches.
///
/// In configuration files a pattern is either a plain string (substring
/// match) or `{ "regex": "...", "flags": "i" }`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RulesConfig")]
pub struct Rules(Vec<Rule>);

impl TryFrom<RulesConfig> for Rules {
  type Error = regex::Error;

  fn try_from(value: RulesConfig) -> Result<Self, Self::Error> {
    let rules = match value {
      RulesConfig::One(rule) => vec![Rule::try_from(rule)?],
      RulesConfig::Many(rules) => rules
        .into_iter()
        .map(Rule::try_from)
        .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(Rules(rules))
  }
}

impl Rules {
  pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
    Rules(rules.into_iter().collect())
  }

  pub fn is_match(&self, name: &str) -> bool {
    self.0.iter().any(|rule| rule.is_match(name))
  }
}

impl Default for Rules {
  /// CSS files, optionally followed by a query string
  fn default() -> Self {
    Rules(vec![Rule::Regex(
      Regex::new(r"(?i)\.css(\?.*)?$").expect("static css pattern is valid"),
    )])
  }
}

impl From<&str> for Rules {
  fn from(value: &str) -> Self {
    Rules(vec![Rule::from(value)])
  }
}

impl From<Regex> for Rules {
  fn from(value: Regex) -> Self {
    Rules(vec![Rule::Regex(value)])
  }
}

/// Decides which assets of a compilation are minified
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchRules {
  pub test: Rules,
  pub include: Option<Rules>,
  pub exclude: Option<Rules>,
}

impl MatchRules {
  pub fn is_match(&self, name: &str) -> bool {
    if !self.test.is_match(name) {
      return false;
    }

    if let Some(include) = &self.include {
      if !include.is_match(name) {
        return false;
      }
    }

    !self
      .exclude
      .as_ref()
      .is_some_and(|exclude| exclude.is_match(name))
  }
}
