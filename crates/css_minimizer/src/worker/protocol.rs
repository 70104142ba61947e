//! Line based protocol between the host and worker processes.
//!
//! The host writes one JSON encoded [`WorkerRequest`] per line to the
//! worker's stdin. The worker answers with one [`WorkerResponse`] per request
//! on stdout, prefixed with [`FRAME_PREFIX`] so that anything a minifier
//! prints itself can be told apart and forwarded.
use css_minimizer_core::types::{MinifyError, MinifyResult};
use serde::{Deserialize, Serialize};

use super::WorkerChannelError;
use crate::minify::MinifyRequest;

pub const FRAME_PREFIX: &str = "\u{1e}css-minimizer-frame:";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WorkerRequest {
  pub id: u64,
  pub request: MinifyRequest,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WorkerResponse {
  pub id: u64,
  pub result: MinifyResult,
}

/// Only the id of a message, used to answer messages that fail to decode
#[derive(Deserialize)]
struct MessageId {
  id: u64,
}

pub fn encode_request(request: &WorkerRequest) -> Result<String, WorkerChannelError> {
  let mut line = serde_json::to_string(request)?;
  line.push('\n');
  Ok(line)
}

pub fn encode_response(response: &WorkerResponse) -> Result<String, WorkerChannelError> {
  Ok(format!("{}{}", FRAME_PREFIX, serde_json::to_string(response)?))
}

/// Decodes a request line.
///
/// When the line cannot be decoded but carries an id, the returned response
/// reports the failure to the host.
pub fn decode_request(line: &str) -> Result<WorkerRequest, Option<WorkerResponse>> {
  serde_json::from_str::<WorkerRequest>(line).map_err(|err| {
    serde_json::from_str::<MessageId>(line)
      .ok()
      .map(|MessageId { id }| WorkerResponse {
        id,
        result: MinifyResult::failure(MinifyError::new(format!(
          "Worker failed to decode task: {}",
          err
        ))),
      })
  })
}

/// A line of worker stdout, split into text to forward and a protocol frame
#[derive(Debug, PartialEq)]
pub struct OutputLine<'a> {
  pub text: Option<&'a str>,
  pub frame: Option<&'a str>,
}

/// Splits a worker stdout line.
///
/// Minifiers may print without a trailing newline, so a frame can follow
/// other text on the same line.
pub fn split_output_line(line: &str) -> OutputLine<'_> {
  match line.find(FRAME_PREFIX) {
    Some(index) => OutputLine {
      text: Some(&line[..index]).filter(|text| !text.is_empty()),
      frame: Some(&line[index + FRAME_PREFIX.len()..]),
    },
    None => OutputLine {
      text: Some(line),
      frame: None,
    },
  }
}

/// Decodes a frame, recovering the id when possible
pub fn decode_response(frame: &str) -> Result<WorkerResponse, (Option<u64>, WorkerChannelError)> {
  serde_json::from_str::<WorkerResponse>(frame).map_err(|err| {
    let id = serde_json::from_str::<MessageId>(frame)
      .ok()
      .map(|message| message.id);
    (id, WorkerChannelError::Decode(err))
  })
}
