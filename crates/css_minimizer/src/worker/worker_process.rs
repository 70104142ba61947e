use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use super::protocol::{self, WorkerResponse};
use crate::minify::MinifierAdapter;

/// Serves minification requests read from stdin until it is closed.
///
/// This is the body of a worker process. Requests are handled concurrently,
/// each answer is written to stdout as a single frame.
pub async fn run_worker_process(adapter: MinifierAdapter) -> anyhow::Result<()> {
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut in_flight = JoinSet::new();

  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }

    let request = match protocol::decode_request(&line) {
      Ok(request) => request,
      Err(Some(response)) => {
        write_response(&response)?;
        continue;
      }
      Err(None) => {
        tracing::error!("Ignoring malformed request: {}", line);
        continue;
      }
    };

    let adapter = adapter.clone();
    in_flight.spawn(async move {
      let result = adapter.invoke(request.request).await;
      write_response(&WorkerResponse {
        id: request.id,
        result,
      })
    });

    // Reap finished requests as we go so errors surface early
    while let Some(finished) = in_flight.try_join_next() {
      finished??;
    }
  }

  while let Some(finished) = in_flight.join_next().await {
    finished??;
  }

  Ok(())
}

fn write_response(response: &WorkerResponse) -> anyhow::Result<()> {
  let frame = protocol::encode_response(response)?;

  // One locked write per frame, so frames never interleave with each other
  let mut stdout = std::io::stdout().lock();
  writeln!(stdout, "{}", frame)?;
  stdout.flush()?;
  Ok(())
}
