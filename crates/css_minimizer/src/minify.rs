use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use css_minimizer_core::types::{MinifierRef, MinifyError, MinifyInput, MinifyResult};
use css_minimizer_lightningcss::LightningCssMinifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minifiers available to a process, referenced by name
#[derive(Clone, Debug, Default)]
pub struct MinifierRegistry {
  minifiers: BTreeMap<String, MinifierRef>,
}

impl MinifierRegistry {
  pub fn new() -> Self {
    MinifierRegistry::default()
  }

  /// A registry holding the built-in lightningcss minifier
  pub fn with_defaults() -> Self {
    let mut registry = MinifierRegistry::new();
    registry.register(Arc::new(LightningCssMinifier::new()));
    registry
  }

  /// Registers a minifier under its name, replacing any previous one
  pub fn register(&mut self, minifier: MinifierRef) -> &mut Self {
    self
      .minifiers
      .insert(minifier.name().to_string(), minifier);
    self
  }

  pub fn get(&self, name: &str) -> Option<MinifierRef> {
    self.minifiers.get(name).cloned()
  }

  /// Looks up every named minifier, failing on the first unknown name
  pub fn resolve(&self, names: &[String]) -> anyhow::Result<Vec<MinifierRef>> {
    names
      .iter()
      .map(|name| {
        self.get(name).ok_or_else(|| {
          anyhow!(
            "Unknown minifier \"{}\", registered minifiers are: {}",
            name,
            self.minifiers.keys().cloned().collect::<Vec<_>>().join(", ")
          )
        })
      })
      .collect()
  }
}

/// One step of a minifier chain
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifierStage {
  pub minifier: String,
  #[serde(default)]
  pub options: Value,
}

/// The payload of a dispatched task.
///
/// This is everything a worker needs to minify one asset and is sent as is
/// across thread and process boundaries.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyRequest {
  pub name: String,
  pub code: String,
  pub input_map: Option<String>,
  pub source_map: bool,
  pub stages: Vec<MinifierStage>,
}

/// Runs a minifier chain and normalizes whatever happens into a [`MinifyResult`].
///
/// Each stage gets the previous stage's code and map. Errors and panics of a
/// minifier never escape: they become the `error` of the result.
#[derive(Clone, Debug)]
pub struct MinifierAdapter {
  registry: Arc<MinifierRegistry>,
}

impl MinifierAdapter {
  pub fn new(registry: Arc<MinifierRegistry>) -> Self {
    MinifierAdapter { registry }
  }

  pub fn registry(&self) -> &MinifierRegistry {
    &self.registry
  }

  #[tracing::instrument(level = "debug", skip_all, fields(name = %request.name))]
  pub async fn invoke(&self, request: MinifyRequest) -> MinifyResult {
    match self.run_stages(request).await {
      Ok(result) => result,
      Err(error) => MinifyResult::failure(MinifyError::from_anyhow(error)),
    }
  }

  async fn run_stages(&self, request: MinifyRequest) -> anyhow::Result<MinifyResult> {
    let MinifyRequest {
      name,
      code,
      input_map,
      source_map,
      stages,
    } = request;

    if stages.is_empty() {
      return Err(anyhow!("No minifier configured for {}", name));
    }

    let mut result = MinifyResult {
      code,
      map: input_map,
      ..MinifyResult::default()
    };

    for stage in stages {
      let minifier = self
        .registry
        .get(&stage.minifier)
        .ok_or_else(|| anyhow!("Unknown minifier \"{}\"", stage.minifier))?;

      let input = MinifyInput {
        name: name.clone(),
        code: result.code,
        input_map: result.map.take(),
        source_map,
        options: stage.options,
      };

      let output = tokio::spawn(async move { minifier.minify(input).await })
        .await
        .map_err(|error| match error.try_into_panic() {
          Ok(payload) => anyhow::Error::new(MinifyError::new(panic_message(&*payload))),
          Err(error) => anyhow!(error),
        })??;

      result.code = output.code;
      result.map = output.map;
      result.warnings.extend(output.warnings);
    }

    if !source_map {
      result.map = None;
    }

    Ok(result)
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  let detail = if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    String::from("unknown panic")
  };

  format!("Minifier panicked: {}", detail)
}
