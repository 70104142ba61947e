use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct WorkerWithBusyness<W> {
  worker: Arc<W>,
  active_tasks: AtomicUsize,
}

/// A fixed set of workers handing out the least busy one
pub struct WorkerCollection<W> {
  workers: Vec<Arc<WorkerWithBusyness<W>>>,
}

/// Tracks a worker's busyness, the active task count is decremented on drop
pub struct BusyWorkerGuard<W> {
  worker: Arc<W>,
  busy_worker: Arc<WorkerWithBusyness<W>>,
}

impl<W> std::ops::Deref for BusyWorkerGuard<W> {
  type Target = W;

  fn deref(&self) -> &Self::Target {
    &self.worker
  }
}

impl<W> Drop for BusyWorkerGuard<W> {
  fn drop(&mut self) {
    self
      .busy_worker
      .active_tasks
      .fetch_sub(1, Ordering::Relaxed);
  }
}

impl<W> WorkerCollection<W> {
  pub fn new(workers: Vec<Arc<W>>) -> Self {
    WorkerCollection {
      workers: workers
        .into_iter()
        .map(|worker| {
          Arc::new(WorkerWithBusyness {
            worker,
            active_tasks: AtomicUsize::new(0),
          })
        })
        .collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.workers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.workers.is_empty()
  }

  /// Returns `None` for an empty collection
  pub fn next_worker(&self) -> Option<BusyWorkerGuard<W>> {
    let selected = self
      .workers
      .iter()
      .min_by_key(|worker| worker.active_tasks.load(Ordering::Relaxed))?;

    selected.active_tasks.fetch_add(1, Ordering::Relaxed);

    Some(BusyWorkerGuard {
      worker: selected.worker.clone(),
      busy_worker: selected.clone(),
    })
  }

  pub fn all_workers(&self) -> Vec<Arc<W>> {
    self
      .workers
      .iter()
      .map(|worker| worker.worker.clone())
      .collect()
  }
}
