use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use css_minimizer::{
  CacheOption, CssMinimizerOptions, CssMinimizerPlugin, Parallelism, SourceMapMode,
};
use css_minimizer_core::diagnostic::Diagnostics;
use css_minimizer_core::types::{Asset, AssetSource, Code, InMemoryCompilation};
use tracing::info;

use crate::BuildArgs;

/// Loads the options file, then applies the command line flags on top
pub fn load_options(args: &BuildArgs, cwd: &Path) -> anyhow::Result<CssMinimizerOptions> {
  let mut options = match &args.config {
    Some(config) => {
      let json = fs::read_to_string(config)
        .with_context(|| format!("Failed to read {}", config.display()))?;
      let mut options = CssMinimizerOptions::from_json(&json)
        .with_context(|| format!("Invalid options in {}", config.display()))?;

      let config_dir = config.parent().unwrap_or(cwd);
      options.context = cwd.join(config_dir).join(&options.context);
      options
    }
    None => CssMinimizerOptions {
      context: cwd.to_path_buf(),
      ..CssMinimizerOptions::default()
    },
  };

  if args.no_parallel {
    options.parallel = Parallelism::Disabled;
  } else if let Some(workers) = args.parallel {
    options.parallel = match workers {
      0 => Parallelism::Disabled,
      workers => Parallelism::Workers(workers),
    };
  }

  if args.source_map {
    options.source_map = SourceMapMode::External;
  } else if args.inline_source_map {
    options.source_map = SourceMapMode::Inline;
  }

  if let Some(cache_dir) = &args.cache_dir {
    options.cache = CacheOption::Directory(cwd.join(cache_dir));
  }

  Ok(options)
}

/// The asset name of a file, relative to the working directory when possible
fn asset_name(file: &Path, cwd: &Path) -> String {
  let absolute = cwd.join(file);
  let relative = pathdiff::diff_paths(&absolute, cwd)
    .filter(|relative| !relative.starts_with(".."))
    .unwrap_or(absolute);

  relative.to_string_lossy().replace('\\', "/")
}

/// Reads a file and, when maps are enabled, the `.map` file next to it
fn read_asset(file: &Path, name: String, source_map: SourceMapMode) -> anyhow::Result<Asset> {
  let code = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
  let code = Code::new(code);

  let map_file = PathBuf::from(format!("{}.map", file.display()));
  let source = if source_map.is_enabled() && map_file.is_file() {
    AssetSource::SourceMapped {
      code,
      map: fs::read_to_string(&map_file)?,
      original_input: None,
      original_map: None,
    }
  } else {
    AssetSource::Raw { code }
  };

  Ok(Asset::new(name, source))
}

fn write_outputs(
  compilation: &InMemoryCompilation,
  out_dir: &Path,
  source_map: SourceMapMode,
) -> anyhow::Result<()> {
  for asset in compilation.assets() {
    let output = out_dir.join(&asset.name);
    if let Some(parent) = output.parent() {
      fs::create_dir_all(parent)?;
    }

    fs::write(&output, asset.source.code().bytes())
      .with_context(|| format!("Failed to write {}", output.display()))?;

    if let (SourceMapMode::External, Some(map)) = (source_map, asset.source.map()) {
      fs::write(format!("{}.map", output.display()), map)?;
    }
  }

  Ok(())
}

/// Runs one optimize pass over the files. Fails with every reported error
/// once all outputs are written.
pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
  let cwd = std::env::current_dir()?;
  let options = load_options(&args, &cwd)?;
  let source_map = options.source_map;

  let mut compilation = InMemoryCompilation::default();
  for file in &args.files {
    let name = asset_name(file, &cwd);
    compilation.insert(read_asset(&cwd.join(file), name, source_map)?);
  }

  let plugin = CssMinimizerPlugin::new(options)?;
  plugin.optimize(&mut compilation).await?;

  let out_dir = cwd.join(&args.out_dir);
  write_outputs(&compilation, &out_dir, source_map)?;

  let (errors, warnings) = compilation.take_diagnostics();
  for warning in &warnings {
    eprintln!("Warning: {}", warning);
  }

  info!(
    "Minified {} files into {} with {} errors and {} warnings",
    args.files.len(),
    out_dir.display(),
    errors.len(),
    warnings.len()
  );

  if !errors.is_empty() {
    let count = errors.len();
    return Err(anyhow::Error::new(Diagnostics::from(errors)).context(format!(
      "{} CSS minification errors",
      count
    )));
  }

  Ok(())
}
