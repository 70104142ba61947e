use std::future::Future;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Error)]
pub enum ThrottleError {
  #[error("Concurrency limit must be a positive integer, got {0}")]
  InvalidArgument(usize),
  #[error(transparent)]
  Task(anyhow::Error),
  #[error("Throttled task did not complete: {0}")]
  Join(#[from] JoinError),
}

/// Runs deferred tasks with at most `limit` of them in flight.
///
/// Tasks start in input order; each completion starts the next queued task.
/// Results are returned in input order. The first failing task fails the
/// whole run. Tasks still in flight are aborted and awaited before it
/// returns, so callers that need per-item isolation handle failures inside
/// each task.
pub async fn throttle_all<T, F, Fut>(limit: usize, tasks: Vec<F>) -> Result<Vec<T>, ThrottleError>
where
  T: Send + 'static,
  F: FnOnce() -> Fut + Send + 'static,
  Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
  if limit == 0 {
    return Err(ThrottleError::InvalidArgument(limit));
  }

  let mut results: Vec<Option<T>> = Vec::with_capacity(tasks.len());
  results.resize_with(tasks.len(), || None);

  let mut queued = tasks.into_iter().enumerate();
  let mut running = JoinSet::new();

  for (index, task) in queued.by_ref().take(limit) {
    running.spawn(async move { (index, task().await) });
  }

  while let Some(joined) = running.join_next().await {
    let finished = match joined {
      Ok((index, result)) => result.map(|value| (index, value)).map_err(ThrottleError::Task),
      Err(err) => Err(ThrottleError::Join(err)),
    };

    let (index, value) = match finished {
      Ok(finished) => finished,
      Err(err) => {
        running.shutdown().await;
        return Err(err);
      }
    };
    results[index] = Some(value);

    if let Some((index, task)) = queued.next() {
      running.spawn(async move { (index, task().await) });
    }
  }

  Ok(results.into_iter().flatten().collect())
}
