//! Executor streaming protocol.
//!
//! `POST /generate_stream` answers with newline-delimited JSON events. Each event
//! maps onto one [`RequestOutputWriter`] operation.

use llmserve_core::{CandidateDelta, FinishReason, RequestOutputWriter, StopReason};
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use serde::{Deserialize, Serialize};

/// One event in an executor's generation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Prompt tokenization, sent before any delta.
    Prompt {
        /// Prompt token ids
        token_ids: Vec<u32>,
    },
    /// New tokens for one candidate.
    Delta {
        /// Candidate index
        index: usize,
        /// Decoded text of the new tokens
        #[serde(default)]
        text: String,
        /// New token ids
        #[serde(default)]
        token_ids: Vec<u32>,
        /// Log-probabilities of the new tokens
        #[serde(default)]
        logprobs: Vec<f32>,
    },
    /// A candidate stopped.
    Finish {
        /// Candidate index
        index: usize,
        /// Why it stopped
        finish_reason: FinishReason,
        /// Stop token or string that matched
        #[serde(default)]
        stop_reason: Option<StopReason>,
    },
    /// The executor gave up on the request.
    Error {
        /// Executor-provided description
        message: String,
    },
}

impl EngineEvent {
    /// Parse one NDJSON line.
    pub fn parse(line: &str) -> ServeResult<Self> {
        serde_json::from_str(line).map_err(|e| {
            ServeError::new(ServeErrorKind::Engine(format!(
                "Malformed executor event: {e}"
            )))
        })
    }

    /// Apply the event to the request it belongs to.
    ///
    /// Error events are returned as errors so the caller can abort the request.
    pub fn apply(self, writer: &mut RequestOutputWriter) -> ServeResult<()> {
        match self {
            Self::Prompt { token_ids } => {
                writer.set_prompt_token_ids(token_ids);
                Ok(())
            }
            Self::Delta {
                index,
                text,
                token_ids,
                logprobs,
            } => writer.append(index, CandidateDelta::new(text, token_ids, logprobs)),
            Self::Finish {
                index,
                finish_reason,
                stop_reason,
            } => writer.finish_candidate(index, finish_reason, stop_reason),
            Self::Error { message } => Err(ServeError::new(ServeErrorKind::Engine(message))),
        }
    }
}

/// Splits a chunked byte stream into complete lines.
///
/// A line longer than the buffer's limit is an error.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line_bytes(Self::DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    /// Longest event line accepted by default.
    pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

    /// Buffer accepting lines of at most `max_line_bytes` bytes.
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
        }
    }

    /// Feed a chunk, returning every line it completes. Blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> ServeResult<Vec<String>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1])? {
                lines.push(line);
            }
        }
        if self.pending.len() > self.max_line_bytes {
            let buffered = self.pending.len();
            self.pending.clear();
            return Err(ServeError::new(ServeErrorKind::Engine(format!(
                "Executor event line exceeds {} bytes ({buffered} buffered)",
                self.max_line_bytes
            ))));
        }
        Ok(lines)
    }

    /// Whatever remains after the stream ends, if it is not blank.
    pub fn finish(&mut self) -> ServeResult<Option<String>> {
        let raw = std::mem::take(&mut self.pending);
        decode_line(&raw)
    }
}

fn decode_line(raw: &[u8]) -> ServeResult<Option<String>> {
    let line = std::str::from_utf8(raw).map_err(|e| {
        ServeError::new(ServeErrorKind::Engine(format!(
            "Executor sent invalid UTF-8: {e}"
        )))
    })?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}
