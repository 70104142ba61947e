use std::collections::HashMap;
use std::sync::Arc;

use css_minimizer_core::diagnostic::Diagnostic;
use css_minimizer_core::types::{AssetInfo, Compilation, MinifierRef, MinifyError};

use crate::cache::{CacheKeyBuilder, CachedResult, PersistentCache, TaskCache};
use crate::diagnostics::{ContextShortener, DiagnosticsTranslator};
use crate::minify::{MinifierAdapter, MinifierRegistry, MinifierStage};
use crate::options::CssMinimizerOptions;
use crate::rules::MatchRules;
use crate::task::Task;
use crate::throttle::throttle_all;
use crate::worker::{available_cores, prepare, Dispatcher, WorkerKind};

/// Tasks sharing a cache identity. Only the first one is minified, the others
/// reuse its result.
struct TaskGroup {
  tasks: Vec<Task>,
}

impl TaskGroup {
  fn leader(&self) -> &Task {
    &self.tasks[0]
  }
}

enum Outcome {
  /// Found in either cache tier
  Cached(Arc<CachedResult>),
  /// Minified during this pass
  Minified(Arc<CachedResult>),
  Failed(MinifyError),
}

/// Minifies the CSS assets of a compilation.
///
/// One [`CssMinimizerPlugin::optimize`] call is one pass: matching assets are
/// looked up in the cache, the rest is minified inline or on a worker pool,
/// then every result is committed to the compilation. A failing asset is
/// reported as an error and left untouched, it never stops the others.
pub struct CssMinimizerPlugin {
  options: CssMinimizerOptions,
  rules: MatchRules,
  adapter: MinifierAdapter,
  minifiers: Vec<MinifierRef>,
  stages: Vec<MinifierStage>,
  cache_keys: CacheKeyBuilder,
  cache: TaskCache,
  translator: DiagnosticsTranslator,
}

impl std::fmt::Debug for CssMinimizerPlugin {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CssMinimizerPlugin")
      .field("options", &self.options)
      .field("persistent_cache", &self.cache.persistent())
      .finish()
  }
}

impl CssMinimizerPlugin {
  /// A plugin using the built-in minifiers
  pub fn new(options: CssMinimizerOptions) -> anyhow::Result<Self> {
    CssMinimizerPlugin::with_registry(options, MinifierRegistry::with_defaults())
  }

  /// Fails when `options.minify` names a minifier missing from `registry`
  pub fn with_registry(
    options: CssMinimizerOptions,
    registry: MinifierRegistry,
  ) -> anyhow::Result<Self> {
    if options.minify.is_empty() {
      return Err(anyhow::anyhow!("At least one minifier must be configured"));
    }

    let minifiers = registry.resolve(&options.minify)?;
    let stages = options
      .minify
      .iter()
      .enumerate()
      .map(|(index, minifier)| MinifierStage {
        minifier: minifier.clone(),
        options: options.minimizer_options_for(index),
      })
      .collect::<Vec<_>>();

    let cache_keys = CacheKeyBuilder::new(
      &minifiers,
      &stages,
      options.source_map,
      options.cache_keys.clone(),
    );

    let persistent = options
      .cache
      .directory(&options.context)
      .map(PersistentCache::directory);

    let translator = DiagnosticsTranslator::new(
      Some(Arc::new(ContextShortener::new(options.context.clone()))),
      options.warnings_filter.clone(),
    );

    Ok(CssMinimizerPlugin {
      rules: options.match_rules(),
      adapter: MinifierAdapter::new(Arc::new(registry)),
      minifiers,
      stages,
      cache_keys,
      cache: TaskCache::new(persistent),
      translator,
      options,
    })
  }

  /// Replaces the persistent cache tier, e.g. with the host's own cache
  pub fn with_persistent_cache(mut self, cache: PersistentCache) -> Self {
    self.cache = TaskCache::new(Some(cache));
    self
  }

  pub fn options(&self) -> &CssMinimizerOptions {
    &self.options
  }

  fn worker_kind(&self) -> WorkerKind {
    if self
      .minifiers
      .iter()
      .all(|minifier| minifier.supports_worker_threads())
    {
      WorkerKind::Threads
    } else {
      WorkerKind::Processes
    }
  }

  /// Creates the tasks of a pass, grouped by cache identity
  fn collect_tasks(&self, compilation: &mut dyn Compilation) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for name in compilation.asset_names() {
      if !self.rules.is_match(&name) {
        continue;
      }

      let Some(asset) = compilation.get_asset(&name) else {
        continue;
      };

      if asset.info.minimized {
        tracing::trace!("Skipping {}, it is already minimized", name);
        continue;
      }

      let task = Task::new(asset, self.options.source_map, &self.cache_keys);

      if task.invalid_input_map {
        compilation.push_warning(
          Diagnostic::new(format!("{} contains invalid source map", task.name))
            .with_asset(&task.name),
        );
      }

      match group_index.get(&task.cache_identity) {
        Some(index) => groups[*index].tasks.push(task),
        None => {
          group_index.insert(task.cache_identity.clone(), groups.len());
          groups.push(TaskGroup { tasks: vec![task] });
        }
      }
    }

    groups
  }

  /// Runs one optimize pass over the assets of `compilation`
  #[tracing::instrument(level = "debug", skip_all)]
  pub async fn optimize(&self, compilation: &mut dyn Compilation) -> anyhow::Result<()> {
    let groups = self.collect_tasks(compilation);
    if groups.is_empty() {
      return Ok(());
    }

    let mut outcomes = groups
      .iter()
      .map(|group| {
        let leader = group.leader();

        // Any member seen before answers for the whole group
        group
          .tasks
          .iter()
          .skip(1)
          .find_map(|task| self.cache.recall(&task.source))
          .or_else(|| self.cache.get(&leader.source, &leader.cache_identity))
          .map(Outcome::Cached)
      })
      .collect::<Vec<_>>();

    let misses = outcomes
      .iter()
      .enumerate()
      .filter(|(_, outcome)| outcome.is_none())
      .map(|(index, _)| index)
      .collect::<Vec<_>>();

    tracing::debug!(
      "Minifying {} of {} CSS assets",
      misses.len(),
      outcomes.len()
    );

    if !misses.is_empty() {
      let plan = prepare(self.options.parallel, misses.len(), available_cores());
      let dispatcher = Arc::new(Dispatcher::start(
        plan,
        self.worker_kind(),
        self.adapter.clone(),
        self.options.worker_command.as_ref(),
      ));

      let jobs = misses
        .iter()
        .map(|index| {
          let dispatcher = dispatcher.clone();
          let request = groups[*index]
            .leader()
            .request(&self.stages, self.options.source_map);

          move || async move { Ok::<_, anyhow::Error>(dispatcher.run(request).await) }
        })
        .collect::<Vec<_>>();

      let limit = dispatcher.concurrency(jobs.len());
      let results = throttle_all(limit, jobs).await;

      dispatcher.teardown().await;

      for (index, result) in misses.into_iter().zip(results?) {
        outcomes[index] = Some(match result.error {
          Some(error) => Outcome::Failed(error),
          None => match CachedResult::from_result(result) {
            Some(result) => Outcome::Minified(Arc::new(result)),
            None => Outcome::Failed(MinifyError::new("Minifier returned no result")),
          },
        });
      }
    }

    for (group, outcome) in groups.iter().zip(outcomes) {
      match outcome {
        Some(outcome) => self.commit(compilation, group, outcome),
        None => tracing::error!("No outcome for {}", group.leader().name),
      }
    }

    self.cache.finish_pass().log();

    Ok(())
  }

  fn commit(&self, compilation: &mut dyn Compilation, group: &TaskGroup, outcome: Outcome) {
    let result = match outcome {
      Outcome::Failed(error) => {
        for task in &group.tasks {
          compilation.push_error(self.translator.build_error(
            &error,
            &task.name,
            task.input_map.as_deref(),
          ));
        }
        return;
      }
      Outcome::Minified(result) => {
        let leader = group.leader();
        self
          .cache
          .store(&leader.source, &leader.cache_identity, result.clone());
        result
      }
      Outcome::Cached(result) => result,
    };

    for task in &group.tasks {
      self.cache.remember(&task.source, result.clone());

      let output = task.output(&result, self.options.source_map);
      if let Err(err) = compilation.update_asset(
        &task.name,
        Arc::new(output),
        AssetInfo::minimized_from(&task.info),
      ) {
        compilation.push_error(
          Diagnostic::new(format!("Failed to update {}: {:#}", task.name, err))
            .with_asset(&task.name),
        );
        continue;
      }

      for warning in &result.warnings {
        if let Some(warning) =
          self
            .translator
            .build_warning(warning, &task.name, task.input_map.as_deref())
        {
          compilation.push_warning(warning);
        }
      }
    }
  }
}
