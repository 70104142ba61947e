use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use css_minimizer_core::types::MinifyResult;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::collection::WorkerCollection;
use super::protocol::{self, WorkerRequest};
use super::WorkerChannelError;
use crate::minify::MinifyRequest;

/// How to start a worker process
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
}

impl WorkerCommand {
  pub fn new(
    program: impl Into<PathBuf>,
    args: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self {
    WorkerCommand {
      program: program.into(),
      args: args.into_iter().map(Into::into).collect(),
    }
  }

  /// The running executable's `worker` subcommand
  pub fn current_exe() -> anyhow::Result<Self> {
    Ok(WorkerCommand::new(std::env::current_exe()?, ["worker"]))
  }
}

type Reply = oneshot::Sender<Result<MinifyResult, WorkerChannelError>>;
type PendingReplies = Arc<Mutex<HashMap<u64, Reply>>>;

/// A worker process and the tasks it has not answered yet
pub struct WorkerProcess {
  index: usize,
  next_id: AtomicU64,
  stdin: tokio::sync::Mutex<Option<ChildStdin>>,
  child: tokio::sync::Mutex<Child>,
  pending: PendingReplies,
  reader: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerProcess {
  fn spawn(index: usize, command: &WorkerCommand) -> Result<Self, WorkerChannelError> {
    let mut child = Command::new(&command.program)
      .args(&command.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .kill_on_drop(true)
      .spawn()
      .map_err(WorkerChannelError::Spawn)?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
      return Err(WorkerChannelError::Closed);
    };

    let pending = PendingReplies::default();
    let reader = tokio::spawn(read_output(
      index,
      stdout,
      tokio::io::stdout(),
      pending.clone(),
    ));

    Ok(WorkerProcess {
      index,
      next_id: AtomicU64::new(0),
      stdin: tokio::sync::Mutex::new(Some(stdin)),
      child: tokio::sync::Mutex::new(child),
      pending,
      reader: Mutex::new(Some(reader)),
    })
  }

  async fn run(&self, request: MinifyRequest) -> Result<MinifyResult, WorkerChannelError> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let line = protocol::encode_request(&WorkerRequest { id, request })?;

    let (reply, response) = oneshot::channel();
    self.pending.lock().insert(id, reply);

    if let Err(err) = self.write(&line).await {
      self.pending.lock().remove(&id);
      return Err(err);
    }

    response.await.map_err(|_| WorkerChannelError::Closed)?
  }

  async fn write(&self, line: &str) -> Result<(), WorkerChannelError> {
    let mut stdin = self.stdin.lock().await;
    let stdin = stdin.as_mut().ok_or(WorkerChannelError::Closed)?;

    stdin
      .write_all(line.as_bytes())
      .await
      .map_err(WorkerChannelError::Send)?;
    stdin.flush().await.map_err(WorkerChannelError::Send)
  }

  /// Closes stdin, which lets the worker finish and exit, then reaps it
  async fn shutdown(&self) {
    self.stdin.lock().await.take();

    let mut child = self.child.lock().await;
    match child.wait().await {
      Ok(status) if !status.success() => {
        tracing::warn!("Minifier worker {} exited with {}", self.index, status);
      }
      Ok(_) => {}
      Err(err) => {
        tracing::error!("Failed to wait for minifier worker {}: {}", self.index, err);
        if let Err(err) = child.kill().await {
          tracing::error!("Failed to kill minifier worker {}: {}", self.index, err);
        }
      }
    }

    let reader = self.reader.lock().take();
    if let Some(reader) = reader {
      if let Err(err) = reader.await {
        tracing::error!("Minifier worker {} output reader failed: {}", self.index, err);
      }
    }
  }
}

/// Routes frames to the waiting tasks and forwards everything else the
/// worker prints to `host_stdout`.
async fn read_output<R, W>(index: usize, output: R, mut host_stdout: W, pending: PendingReplies)
where
  R: AsyncRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let mut lines = BufReader::new(output).lines();

  loop {
    let line = match lines.next_line().await {
      Ok(Some(line)) => line,
      Ok(None) => break,
      Err(err) => {
        tracing::error!("Failed to read from minifier worker {}: {}", index, err);
        fail_pending(&pending, || WorkerChannelError::Receive(err.kind().into()));
        return;
      }
    };

    let output = protocol::split_output_line(&line);

    if let Some(text) = output.text {
      let forwarded = host_stdout.write_all(format!("{}\n", text).as_bytes()).await;
      if let Err(err) = forwarded.and(host_stdout.flush().await) {
        tracing::warn!("Failed to forward minifier worker {} output: {}", index, err);
      }
    }

    let Some(frame) = output.frame else {
      continue;
    };

    match protocol::decode_response(frame) {
      Ok(response) => {
        if let Some(reply) = pending.lock().remove(&response.id) {
          let _ = reply.send(Ok(response.result));
        }
      }
      Err((Some(id), err)) => {
        if let Some(reply) = pending.lock().remove(&id) {
          let _ = reply.send(Err(err));
        }
      }
      Err((None, err)) => {
        tracing::error!("Dropping unreadable frame from minifier worker {}: {}", index, err);
      }
    }
  }

  // Whatever is still pending will never be answered
  fail_pending(&pending, || WorkerChannelError::Closed);
}

fn fail_pending(pending: &PendingReplies, error: impl Fn() -> WorkerChannelError) {
  for (_, reply) in pending.lock().drain() {
    let _ = reply.send(Err(error()));
  }
}

/// Worker processes speaking the line protocol, tasks go to the least busy one
pub struct ProcessPool {
  workers: WorkerCollection<WorkerProcess>,
}

impl ProcessPool {
  pub fn new(size: usize, command: &WorkerCommand) -> Result<Self, WorkerChannelError> {
    let workers = (0..size)
      .map(|index| WorkerProcess::spawn(index, command).map(Arc::new))
      .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!("Started {} minifier processes", size);

    Ok(ProcessPool {
      workers: WorkerCollection::new(workers),
    })
  }

  pub fn size(&self) -> usize {
    self.workers.len()
  }

  pub async fn run(&self, request: MinifyRequest) -> Result<MinifyResult, WorkerChannelError> {
    let worker = self.workers.next_worker().ok_or(WorkerChannelError::Closed)?;
    worker.run(request).await
  }

  /// Closes every worker's stdin and waits for the processes to exit
  pub async fn teardown(&self) {
    for worker in self.workers.all_workers() {
      worker.shutdown().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::worker::FRAME_PREFIX;

  fn pending_reply(
    pending: &PendingReplies,
    id: u64,
  ) -> oneshot::Receiver<Result<MinifyResult, WorkerChannelError>> {
    let (reply, response) = oneshot::channel();
    pending.lock().insert(id, reply);
    response
  }

  #[tokio::test]
  async fn forwards_printed_text_and_fails_unanswered_tasks() {
    let frame = r#"{"id":0,"result":{"code":"a{}","map":null,"warnings":[],"error":null}}"#;
    let output = format!("stray text\nmore text{}{}\n", FRAME_PREFIX, frame);
    let pending = PendingReplies::default();
    let answered = pending_reply(&pending, 0);
    let unanswered = pending_reply(&pending, 1);
    let mut host_stdout = Vec::new();

    read_output(0, output.as_bytes(), &mut host_stdout, pending.clone()).await;

    assert_eq!(
      String::from_utf8(host_stdout).unwrap(),
      "stray text\nmore text\n"
    );
    assert_eq!(answered.await.unwrap().unwrap().code, "a{}");
    assert!(matches!(
      unanswered.await.unwrap(),
      Err(WorkerChannelError::Closed)
    ));
    assert!(pending.lock().is_empty());
  }

  #[cfg(unix)]
  #[tokio::test(flavor = "multi_thread")]
  async fn a_crashing_worker_only_fails_its_own_task() {
    use crate::test_utils::scripted_worker_command;

    let pool = ProcessPool::new(2, &scripted_worker_command()).unwrap();
    let request = |code: &str| MinifyRequest {
      name: String::from("a.css"),
      code: String::from(code),
      ..MinifyRequest::default()
    };

    let (crashed, answered) = tokio::join!(
      pool.run(request("crash")),
      pool.run(request("a { }"))
    );

    assert!(matches!(crashed, Err(WorkerChannelError::Closed)));
    assert_eq!(answered.unwrap().code, "ok");

    pool.teardown().await;
  }
}
