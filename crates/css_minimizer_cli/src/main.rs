use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use css_minimizer::worker::run_worker_process;
use css_minimizer::{MinifierAdapter, MinifierRegistry};
use css_minimizer_monitoring::TracerMode;
use tracing::error;

mod build;

#[derive(Debug, Parser)]
#[command(name = "css-minimizer", version, about = "Minifies CSS files")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Minify CSS files into an output directory
  Build(BuildArgs),
  /// Serve minification requests over stdin and stdout
  #[command(hide = true)]
  Worker,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Maximum number of workers, 0 minifies inline
  #[arg(long, conflicts_with = "no_parallel")]
  pub parallel: Option<usize>,

  #[arg(long)]
  pub no_parallel: bool,

  /// Write external source maps next to the outputs
  #[arg(long)]
  pub source_map: bool,

  /// Embed source maps in the outputs
  #[arg(long, conflicts_with = "source_map")]
  pub inline_source_map: bool,

  /// Directory of the persistent cache
  #[arg(long)]
  pub cache_dir: Option<PathBuf>,

  /// JSON options file
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  #[arg(short, long, default_value = "dist")]
  pub out_dir: PathBuf,

  #[arg(required = true)]
  pub files: Vec<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
  let cli = Cli::parse();

  let result = match cli.command {
    Command::Build(args) => {
      initialize_tracing(true);
      build::run(args).await
    }
    Command::Worker => {
      initialize_tracing(false);
      let adapter = MinifierAdapter::new(Arc::new(MinifierRegistry::with_defaults()));
      run_worker_process(adapter).await
    }
  };

  css_minimizer_monitoring::close_tracing();

  if let Err(err) = result {
    error!("Failed to run css-minimizer: {:#}", err);
    eprintln!("Error: {:#}", err);
    std::process::exit(1);
  }
}

/// Workers only trace when asked to, their stdout carries results
fn initialize_tracing(default_to_stdout: bool) {
  if std::env::var("RUST_LOG").is_err() {
    std::env::set_var("RUST_LOG", "info");
  }

  let mut modes = match TracerMode::from_env() {
    Ok(modes) => modes,
    Err(err) => {
      eprintln!("Ignoring tracing configuration: {}", err);
      vec![]
    }
  };

  if default_to_stdout && modes.is_empty() {
    modes.push(TracerMode::Stdout);
  }

  if let Err(err) = css_minimizer_monitoring::initialize_tracing(&modes) {
    eprintln!("Failed to initialize tracing: {:#}", err);
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("css-minimizer").chain(args.iter().copied()))
  }

  fn build_args(args: &[&str]) -> BuildArgs {
    match parse(args).unwrap().command {
      Command::Build(args) => args,
      command => panic!("Expected a build command, got {:?}", command),
    }
  }

  #[test]
  fn parses_build_arguments() {
    let args = build_args(&[
      "build",
      "--parallel",
      "2",
      "--source-map",
      "--cache-dir",
      ".cache",
      "--out-dir",
      "out",
      "a.css",
      "b.css",
    ]);

    assert_eq!(args.parallel, Some(2));
    assert!(!args.no_parallel);
    assert!(args.source_map);
    assert_eq!(args.cache_dir, Some(PathBuf::from(".cache")));
    assert_eq!(args.out_dir, PathBuf::from("out"));
    assert_eq!(args.files, vec![PathBuf::from("a.css"), PathBuf::from("b.css")]);
  }

  #[test]
  fn defaults_the_output_directory() {
    assert_eq!(build_args(&["build", "a.css"]).out_dir, PathBuf::from("dist"));
  }

  #[test]
  fn requires_files() {
    assert!(parse(&["build"]).is_err());
  }

  #[test]
  fn rejects_conflicting_parallelism() {
    assert!(parse(&["build", "--parallel", "2", "--no-parallel", "a.css"]).is_err());
  }

  #[test]
  fn rejects_conflicting_source_map_modes() {
    assert!(parse(&["build", "--source-map", "--inline-source-map", "a.css"]).is_err());
  }

  #[test]
  fn parses_the_worker_command() {
    assert!(matches!(parse(&["worker"]).unwrap().command, Command::Worker));
  }
}
