use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostic::Diagnostic;

use super::Asset;
use super::AssetInfo;
use super::AssetSource;

/// The bundler side of an optimize pass: an asset store plus the error and
/// warning sinks surfaced in the build's final report.
pub trait Compilation: Send {
  /// Names of every asset in the current pass
  fn asset_names(&self) -> Vec<String>;

  fn get_asset(&self, name: &str) -> Option<Asset>;

  /// Replace the content and info of an existing asset
  fn update_asset(
    &mut self,
    name: &str,
    source: Arc<AssetSource>,
    info: AssetInfo,
  ) -> anyhow::Result<()>;

  fn push_error(&mut self, error: Diagnostic);

  fn push_warning(&mut self, warning: Diagnostic);
}

/// An in-memory asset store, used by the command line and tests
#[derive(Debug, Default)]
pub struct InMemoryCompilation {
  assets: BTreeMap<String, Asset>,
  errors: Vec<Diagnostic>,
  warnings: Vec<Diagnostic>,
}

impl InMemoryCompilation {
  pub fn new(assets: impl IntoIterator<Item = Asset>) -> Self {
    InMemoryCompilation {
      assets: assets
        .into_iter()
        .map(|asset| (asset.name.clone(), asset))
        .collect(),
      ..InMemoryCompilation::default()
    }
  }

  pub fn insert(&mut self, asset: Asset) {
    self.assets.insert(asset.name.clone(), asset);
  }

  pub fn assets(&self) -> impl Iterator<Item = &Asset> {
    self.assets.values()
  }

  pub fn errors(&self) -> &[Diagnostic] {
    &self.errors
  }

  pub fn warnings(&self) -> &[Diagnostic] {
    &self.warnings
  }

  pub fn take_diagnostics(&mut self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
    (
      std::mem::take(&mut self.errors),
      std::mem::take(&mut self.warnings),
    )
  }
}

impl Compilation for InMemoryCompilation {
  fn asset_names(&self) -> Vec<String> {
    self.assets.keys().cloned().collect()
  }

  fn get_asset(&self, name: &str) -> Option<Asset> {
    self.assets.get(name).cloned()
  }

  fn update_asset(
    &mut self,
    name: &str,
    source: Arc<AssetSource>,
    info: AssetInfo,
  ) -> anyhow::Result<()> {
    let Some(asset) = self.assets.get_mut(name) else {
      return Err(anyhow::anyhow!("Asset {} does not exist", name));
    };

    asset.source = source;
    asset.info = info;
    Ok(())
  }

  fn push_error(&mut self, error: Diagnostic) {
    self.errors.push(error);
  }

  fn push_warning(&mut self, warning: Diagnostic) {
    self.warnings.push(warning);
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn updates_existing_assets_only() {
    let mut compilation = InMemoryCompilation::new([Asset::new("a.css", AssetSource::raw("a {}"))]);

    compilation
      .update_asset(
        "a.css",
        Arc::new(AssetSource::raw("a{}")),
        AssetInfo {
          minimized: true,
          ..AssetInfo::default()
        },
      )
      .unwrap();

    let asset = compilation.get_asset("a.css").unwrap();
    assert_eq!(asset.source.code().to_text(), "a{}");
    assert!(asset.info.minimized);

    assert!(compilation
      .update_asset("b.css", Arc::new(AssetSource::raw("")), AssetInfo::default())
      .is_err());
  }

  #[test]
  fn lists_asset_names_in_order() {
    let compilation = InMemoryCompilation::new([
      Asset::new("b.css", AssetSource::raw("")),
      Asset::new("a.css", AssetSource::raw("")),
    ]);

    assert_eq!(compilation.asset_names(), vec!["a.css", "b.css"]);
  }
}
