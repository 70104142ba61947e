use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use css_minimizer_core::types::{
  Minifier, MinifierOutput, MinifyError, MinifyInput, RawWarning,
};

/// Strips whitespace and counts its invocations.
///
/// Inputs containing `throw` are rejected, each `/*warn*/` marker produces a
/// warning at its generated position.
#[derive(Debug, Default)]
pub struct CountingMinifier {
  pub calls: Arc<AtomicUsize>,
  pub worker_threads: bool,
}

impl CountingMinifier {
  pub fn new() -> Self {
    CountingMinifier {
      calls: Arc::new(AtomicUsize::new(0)),
      worker_threads: true,
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Minifier for CountingMinifier {
  fn name(&self) -> &str {
    "counting"
  }

  fn version(&self) -> String {
    String::from("counting@1")
  }

  fn supports_worker_threads(&self) -> bool {
    self.worker_threads
  }

  async fn minify(&self, input: MinifyInput) -> anyhow::Result<MinifierOutput> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    if input.code.contains("throw") {
      return Err(MinifyError::new("Unexpected throw").with_position(1, 0).into());
    }

    let warnings = input
      .code
      .match_indices("/*warn*/")
      .map(|(offset, _)| RawWarning::Structured {
        message: String::from("Found a warning marker"),
        line: Some(1),
        column: Some(offset as u32),
      })
      .collect();

    Ok(MinifierOutput {
      code: input.code.split_whitespace().collect(),
      map: input.input_map.filter(|_| input.source_map),
      warnings,
    })
  }
}

#[derive(Debug)]
pub struct FailingMinifier;

#[async_trait]
impl Minifier for FailingMinifier {
  fn name(&self) -> &str {
    "failing"
  }

  fn version(&self) -> String {
    String::from("failing@1")
  }

  async fn minify(&self, _input: MinifyInput) -> anyhow::Result<MinifierOutput> {
    Err(MinifyError::new("Unexpected token").with_position(1, 2).into())
  }
}

#[derive(Debug)]
pub struct PanickingMinifier;

#[async_trait]
impl Minifier for PanickingMinifier {
  fn name(&self) -> &str {
    "panicking"
  }

  fn version(&self) -> String {
    String::from("panicking@1")
  }

  async fn minify(&self, _input: MinifyInput) -> anyhow::Result<MinifierOutput> {
    panic!("minifier exploded");
  }
}

/// Prefixes the code with its label and reports that it ran
#[derive(Debug)]
pub struct PrefixMinifier {
  name: String,
  label: String,
}

impl PrefixMinifier {
  pub fn new(label: &str) -> Self {
    PrefixMinifier {
      name: format!("prefix-{}", label),
      label: label.to_string(),
    }
  }
}

#[async_trait]
impl Minifier for PrefixMinifier {
  fn name(&self) -> &str {
    &self.name
  }

  fn version(&self) -> String {
    format!("{}@1", self.name)
  }

  async fn minify(&self, input: MinifyInput) -> anyhow::Result<MinifierOutput> {
    Ok(MinifierOutput {
      code: format!("{}:{}", self.label, input.code),
      map: None,
      warnings: vec![RawWarning::from(format!("{} ran", self.name).as_str())],
    })
  }
}

/// A worker process that answers every task with `ok` after printing a line
/// of its own. It exits as soon as it receives a task mentioning `crash`.
#[cfg(unix)]
pub fn scripted_worker_command() -> crate::worker::WorkerCommand {
  const SCRIPT: &str = r#"
while IFS= read -r line; do
  case "$line" in *crash*) exit 3 ;; esac
  id=$(printf '%s' "$line" | sed -n 's/^{"id":\([0-9]*\).*/\1/p')
  printf 'stray output\n'
  printf '\036css-minimizer-frame:'
  printf '{"id":%s,"result":{"code":"ok","map":null,"warnings":[],"error":null}}\n' "$id"
done
"#;

  crate::worker::WorkerCommand::new("sh", ["-c", SCRIPT])
}
