//! Inline and parallel execution of minification requests.
use css_minimizer_core::types::{MinifyError, MinifyResult};
use thiserror::Error;

use crate::minify::{MinifierAdapter, MinifyRequest};
use crate::options::Parallelism;

pub use collection::*;
pub use process_pool::*;
pub use protocol::{WorkerRequest, WorkerResponse, FRAME_PREFIX};
pub use thread_pool::*;
pub use worker_process::*;

mod collection;
mod process_pool;
pub mod protocol;
mod thread_pool;
mod worker_process;

/// Failures of the transport between the host and a worker
#[derive(Debug, Error)]
pub enum WorkerChannelError {
  #[error("Failed to start worker: {0}")]
  Spawn(#[source] std::io::Error),
  #[error("Failed to send task to worker: {0}")]
  Send(#[source] std::io::Error),
  #[error("Failed to receive result from worker: {0}")]
  Receive(#[source] std::io::Error),
  #[error("Worker exited before completing the task")]
  Closed,
  #[error("Failed to decode worker message: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Cores of the machine, at least 1
pub fn available_cores() -> usize {
  num_cpus::get().max(1)
}

/// Workers to use for the requested parallelism, keeping one core for the host
pub fn resolve_worker_count(parallel: Parallelism, cores: usize) -> usize {
  let spare_cores = cores.saturating_sub(1);

  match parallel {
    Parallelism::Disabled => 0,
    Parallelism::Auto => spare_cores,
    Parallelism::Workers(count) => count.min(spare_cores),
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionPlan {
  Inline,
  Pool { size: usize },
}

/// Decides how a pass over `asset_count` assets is executed.
///
/// A pool never has more workers than there are assets.
pub fn prepare(parallel: Parallelism, asset_count: usize, cores: usize) -> ExecutionPlan {
  let workers = resolve_worker_count(parallel, cores);

  if workers == 0 || asset_count == 0 {
    ExecutionPlan::Inline
  } else {
    ExecutionPlan::Pool {
      size: workers.min(asset_count),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
  Threads,
  Processes,
}

/// Runs requests according to an [`ExecutionPlan`]
pub enum Dispatcher {
  Inline(MinifierAdapter),
  Threads(ThreadPool),
  Processes(ProcessPool),
}

impl Dispatcher {
  /// Starts the workers of the plan.
  ///
  /// When workers cannot be started the pass still runs, inline.
  pub fn start(
    plan: ExecutionPlan,
    kind: WorkerKind,
    adapter: MinifierAdapter,
    command: Option<&WorkerCommand>,
  ) -> Self {
    let ExecutionPlan::Pool { size } = plan else {
      return Dispatcher::Inline(adapter);
    };

    let started = match kind {
      WorkerKind::Threads => ThreadPool::new(size, adapter.clone()).map(Dispatcher::Threads),
      WorkerKind::Processes => {
        let command = match command {
          Some(command) => Ok(command.clone()),
          None => WorkerCommand::current_exe(),
        };

        match command {
          Ok(command) => ProcessPool::new(size, &command).map(Dispatcher::Processes),
          Err(err) => {
            tracing::warn!("Unable to locate the minifier worker executable: {:#}", err);
            return Dispatcher::Inline(adapter);
          }
        }
      }
    };

    match started {
      Ok(dispatcher) => dispatcher,
      Err(err) => {
        tracing::warn!("Unable to start minifier workers, minifying inline: {}", err);
        Dispatcher::Inline(adapter)
      }
    }
  }

  /// How many tasks may be in flight at once
  pub fn concurrency(&self, task_count: usize) -> usize {
    match self {
      Dispatcher::Inline(_) => task_count.max(1),
      Dispatcher::Threads(pool) => pool.size(),
      Dispatcher::Processes(pool) => pool.size(),
    }
  }

  pub fn is_inline(&self) -> bool {
    matches!(self, Dispatcher::Inline(_))
  }

  /// Runs one request. Transport failures are reported like minifier errors.
  pub async fn run(&self, request: MinifyRequest) -> MinifyResult {
    let result = match self {
      Dispatcher::Inline(adapter) => return adapter.invoke(request).await,
      Dispatcher::Threads(pool) => pool.run(request).await,
      Dispatcher::Processes(pool) => pool.run(request).await,
    };

    result.unwrap_or_else(|err| MinifyResult::failure(MinifyError::new(err.to_string())))
  }

  /// Stops all workers, a no-op for inline execution
  pub async fn teardown(&self) {
    match self {
      Dispatcher::Inline(_) => {}
      Dispatcher::Threads(pool) => pool.teardown().await,
      Dispatcher::Processes(pool) => pool.teardown().await,
    }
  }
}
