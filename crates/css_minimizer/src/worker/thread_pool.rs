use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use css_minimizer_core::types::MinifyResult;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::WorkerChannelError;
use crate::minify::{MinifierAdapter, MinifyRequest};

struct Job {
  request: MinifyRequest,
  reply: oneshot::Sender<MinifyResult>,
}

/// Worker threads, each driving its own single threaded runtime.
///
/// Jobs are pulled from a shared channel, so an idle thread always picks up
/// the next job.
pub struct ThreadPool {
  size: usize,
  /// `None` once torn down
  sender: Mutex<Option<Sender<Job>>>,
  handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
  pub fn new(size: usize, adapter: MinifierAdapter) -> Result<Self, WorkerChannelError> {
    let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

    let mut handles = Vec::with_capacity(size);
    for index in 0..size {
      let receiver = receiver.clone();
      let adapter = adapter.clone();

      let handle = std::thread::Builder::new()
        .name(format!("css-minimizer-worker-{}", index))
        .spawn(move || run_worker_thread(receiver, adapter))
        .map_err(WorkerChannelError::Spawn)?;

      handles.push(handle);
    }

    tracing::debug!("Started {} minifier threads", size);

    Ok(ThreadPool {
      size,
      sender: Mutex::new(Some(sender)),
      handles: Mutex::new(handles),
    })
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub async fn run(&self, request: MinifyRequest) -> Result<MinifyResult, WorkerChannelError> {
    let (reply, response) = oneshot::channel();

    let sender = self.sender.lock().clone();
    sender
      .ok_or(WorkerChannelError::Closed)?
      .send(Job { request, reply })
      .map_err(|_| WorkerChannelError::Closed)?;

    response.await.map_err(|_| WorkerChannelError::Closed)
  }

  /// Closes the job channel and waits for every thread to exit
  pub async fn teardown(&self) {
    self.sender.lock().take();
    let handles = std::mem::take(&mut *self.handles.lock());

    let joined = tokio::task::spawn_blocking(move || {
      for handle in handles {
        if handle.join().is_err() {
          tracing::error!("Minifier thread panicked");
        }
      }
    })
    .await;

    if let Err(err) = joined {
      tracing::error!("Failed to join minifier threads: {}", err);
    }
  }
}

fn run_worker_thread(receiver: Receiver<Job>, adapter: MinifierAdapter) {
  let runtime = match tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
  {
    Ok(runtime) => runtime,
    Err(err) => {
      tracing::error!("Failed to start minifier thread runtime: {}", err);
      return;
    }
  };

  while let Ok(job) = receiver.recv() {
    let result = runtime.block_on(adapter.invoke(job.request));

    // The caller may have gone away, there is nobody left to tell
    let _ = job.reply.send(result);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use pretty_assertions::assert_eq;

  use super::*;
  use crate::minify::{MinifierRegistry, MinifierStage};
  use crate::test_utils::{CountingMinifier, PanickingMinifier};

  fn request(code: &str, minifier: &str) -> MinifyRequest {
    MinifyRequest {
      name: String::from("a.css"),
      code: String::from(code),
      stages: vec![MinifierStage {
        minifier: String::from(minifier),
        options: serde_json::Value::Null,
      }],
      ..MinifyRequest::default()
    }
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn runs_jobs_on_worker_threads() {
    let minifier = Arc::new(CountingMinifier::new());
    let mut registry = MinifierRegistry::new();
    registry.register(minifier.clone());

    let pool = ThreadPool::new(2, MinifierAdapter::new(Arc::new(registry))).unwrap();

    let (first, second) = tokio::join!(
      pool.run(request("a { }", "counting")),
      pool.run(request("b { }", "counting"))
    );

    assert_eq!(first.unwrap().code, "a{}");
    assert_eq!(second.unwrap().code, "b{}");
    assert_eq!(minifier.calls(), 2);

    pool.teardown().await;
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn panics_do_not_take_down_the_thread() {
    let mut registry = MinifierRegistry::new();
    registry
      .register(Arc::new(PanickingMinifier))
      .register(Arc::new(CountingMinifier::new()));

    let pool = ThreadPool::new(1, MinifierAdapter::new(Arc::new(registry))).unwrap();

    let panicked = pool.run(request("a { }", "panicking")).await.unwrap();
    let recovered = pool.run(request("a { }", "counting")).await.unwrap();

    assert!(panicked.is_error());
    assert_eq!(recovered.code, "a{}");

    pool.teardown().await;
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn shared_pools_can_be_torn_down() {
    let mut registry = MinifierRegistry::new();
    registry.register(Arc::new(CountingMinifier::new()));

    let pool = Arc::new(ThreadPool::new(1, MinifierAdapter::new(Arc::new(registry))).unwrap());
    let shared = pool.clone();

    pool.teardown().await;

    assert!(matches!(
      shared.run(request("a { }", "counting")).await,
      Err(WorkerChannelError::Closed)
    ));
    assert_eq!(shared.size(), 1);
  }
}
