//! Shared accumulator for the results of one generation request.
//!
//! The producer owns a [`RequestOutputWriter`]; consumers hold cloneable
//! [`RequestOutput`] views. Both sides share a watch channel carrying the candidate
//! outputs together with the explicit [`RequestState`], so every mutation wakes the
//! suspended consumers. The poll interval remains as an idle heartbeat: a consumer
//! waiting on a request that never changes still wakes once per interval.

use crate::output::{CandidateDelta, FinishReason, Output, StopReason};
use derive_getters::Getters;
use futures_util::stream::BoxStream;
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Wake-up interval used when none is given.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Completion state of a request. `Pending -> Done` is one-way.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    serde::Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// At least one candidate may still change.
    #[default]
    #[display("pending")]
    Pending,
    /// Every candidate has finished; outputs are final.
    #[display("done")]
    Done,
}

impl RequestState {
    /// Whether the request has completed.
    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

#[derive(Debug, Default)]
struct RequestData {
    prompt_token_ids: Vec<u32>,
    outputs: Vec<Output>,
    state: RequestState,
}

#[derive(Debug)]
struct Shared {
    prompt: String,
    poll_interval: Duration,
    data: watch::Sender<RequestData>,
}

/// Point-in-time copy of a request's results.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
pub struct RequestSnapshot {
    /// Original prompt text
    prompt: String,
    /// Prompt tokenization
    prompt_token_ids: Vec<u32>,
    /// Candidate outputs in index order
    outputs: Vec<Output>,
    /// Completion state at the time of the copy
    state: RequestState,
}

/// Read-only, cloneable view of a request's accumulated results.
///
/// Clones share the same underlying accumulator.
#[derive(Clone)]
pub struct RequestOutput {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RequestOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.shared.data.borrow();
        f.debug_struct("RequestOutput")
            .field("prompt", &self.shared.prompt)
            .field("candidates", &data.outputs.len())
            .field("state", &data.state)
            .finish()
    }
}

impl RequestOutput {
    /// Create an accumulator for `prompt`, returning the producer handle and a reader.
    pub fn channel(prompt: impl Into<String>) -> (RequestOutputWriter, RequestOutput) {
        Self::channel_with_interval(prompt, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`Self::channel`] with a custom idle wake-up interval.
    pub fn channel_with_interval(
        prompt: impl Into<String>,
        poll_interval: Duration,
    ) -> (RequestOutputWriter, RequestOutput) {
        let (data, _) = watch::channel(RequestData::default());
        let shared = Arc::new(Shared {
            prompt: prompt.into(),
            poll_interval,
            data,
        });
        let reader = RequestOutput {
            shared: shared.clone(),
        };
        let writer = RequestOutputWriter {
            shared,
            closed: false,
        };
        (writer, reader)
    }

    /// Original prompt text.
    pub fn prompt(&self) -> &str {
        &self.shared.prompt
    }

    /// Idle wake-up interval of the consumption operations.
    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Prompt tokenization, empty until the producer fills it.
    pub fn prompt_token_ids(&self) -> Vec<u32> {
        self.shared.data.borrow().prompt_token_ids.clone()
    }

    /// Copy of the current candidate outputs.
    pub fn outputs(&self) -> Vec<Output> {
        self.shared.data.borrow().outputs.clone()
    }

    /// Inspect the current outputs without copying them.
    ///
    /// The producer is blocked while `f` runs, so keep it short.
    pub fn with_outputs<R>(&self, f: impl FnOnce(&[Output]) -> R) -> R {
        f(&self.shared.data.borrow().outputs)
    }

    /// Current completion state.
    pub fn state(&self) -> RequestState {
        self.shared.data.borrow().state
    }

    /// Whether every candidate has finished.
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// Consistent copy of prompt ids, outputs and state.
    pub fn snapshot(&self) -> RequestSnapshot {
        let data = self.shared.data.borrow();
        RequestSnapshot {
            prompt: self.shared.prompt.clone(),
            prompt_token_ids: data.prompt_token_ids.clone(),
            outputs: data.outputs.clone(),
            state: data.state,
        }
    }

    /// Whether `other` views the same accumulator.
    pub fn is_same(&self, other: &RequestOutput) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Stream this accumulator until it completes.
    ///
    /// Yields a handle to the same accumulator at every wake-up: immediately, then after
    /// each producer update or poll interval, whichever comes first. Updates landing
    /// between two wake-ups are coalesced. Once the request is done the stream ends
    /// without yielding again; read the final results from `self`.
    pub fn stream(&self) -> BoxStream<'static, RequestOutput> {
        let handle = self.clone();
        Box::pin(async_stream::stream! {
            let mut rx = handle.shared.data.subscribe();
            let interval = handle.shared.poll_interval;
            loop {
                let done = rx.borrow_and_update().state.is_done();
                if done {
                    break;
                }
                yield handle.clone();
                wait_for_change(&mut rx, interval).await;
            }
        })
    }

    /// Suspend until the request completes.
    ///
    /// Never times out on its own; see [`Self::result_timeout`].
    pub async fn result(&self) {
        let mut rx = self.shared.data.subscribe();
        loop {
            let done = rx.borrow_and_update().state.is_done();
            if done {
                return;
            }
            wait_for_change(&mut rx, self.shared.poll_interval).await;
        }
    }

    /// Suspend until the request completes or `timeout` elapses.
    pub async fn result_timeout(&self, timeout: Duration) -> ServeResult<()> {
        tokio::time::timeout(timeout, self.result())
            .await
            .map_err(|_| ServeError::new(ServeErrorKind::Timeout(timeout)))
    }
}

/// Sleep until the producer publishes a change or the interval elapses.
async fn wait_for_change(rx: &mut watch::Receiver<RequestData>, interval: Duration) {
    tokio::select! {
        changed = rx.changed() => {
            // The sender lives in the shared state we hold, so this cannot close while
            // we wait. Fall back to the heartbeat if it somehow does.
            if changed.is_err() {
                tokio::time::sleep(interval).await;
            }
        }
        _ = tokio::time::sleep(interval) => {}
    }
}

/// Exclusive producer handle for a [`RequestOutput`].
///
/// Not cloneable: exactly one producer mutates a request. Dropping the writer without
/// calling [`Self::complete`] aborts the request, so consumers always observe `Done`.
#[derive(Debug)]
pub struct RequestOutputWriter {
    shared: Arc<Shared>,
    closed: bool,
}

impl RequestOutputWriter {
    /// A new reader for the accumulator this writer feeds.
    pub fn reader(&self) -> RequestOutput {
        RequestOutput {
            shared: self.shared.clone(),
        }
    }

    /// Record the prompt tokenization.
    pub fn set_prompt_token_ids(&mut self, token_ids: Vec<u32>) {
        self.shared.data.send_modify(|data| {
            data.prompt_token_ids = token_ids;
        });
    }

    /// Ensure the request has at least `n` candidates, indexed `0..n`.
    pub fn init_candidates(&mut self, n: usize) {
        self.shared.data.send_if_modified(|data| {
            let current = data.outputs.len();
            if current >= n {
                return false;
            }
            data.outputs.extend((current..n).map(Output::empty));
            true
        });
    }

    /// Number of candidates on the request.
    pub fn candidates(&self) -> usize {
        self.shared.data.borrow().outputs.len()
    }

    /// Append newly generated tokens to candidate `index`.
    ///
    /// Consumers are only woken when the update is accepted.
    pub fn append(&mut self, index: usize, delta: CandidateDelta) -> ServeResult<()> {
        let mut result = Ok(());
        self.shared.data.send_if_modified(|data| {
            let candidates = data.outputs.len();
            match data.outputs.get_mut(index) {
                Some(output) => match output.apply(delta) {
                    Ok(()) => true,
                    Err(e) => {
                        result = Err(e);
                        false
                    }
                },
                None => {
                    result = Err(ServeError::new(ServeErrorKind::UnknownCandidate {
                        index,
                        candidates,
                    }));
                    false
                }
            }
        });
        result
    }

    /// Mark candidate `index` finished.
    pub fn finish_candidate(
        &mut self,
        index: usize,
        reason: FinishReason,
        stop_reason: Option<StopReason>,
    ) -> ServeResult<()> {
        let mut result = Ok(());
        self.shared.data.send_if_modified(|data| {
            let candidates = data.outputs.len();
            match data.outputs.get_mut(index) {
                Some(output) => {
                    output.finish(reason, stop_reason);
                    true
                }
                None => {
                    result = Err(ServeError::new(ServeErrorKind::UnknownCandidate {
                        index,
                        candidates,
                    }));
                    false
                }
            }
        });
        result
    }

    /// Whether every candidate has a finish reason.
    pub fn all_finished(&self) -> bool {
        self.shared
            .data
            .borrow()
            .outputs
            .iter()
            .all(Output::is_finished)
    }

    /// Mark the request done. Outputs are final from here on.
    ///
    /// Candidates without a finish reason are labelled `aborted`, so a done request
    /// never has an unfinished candidate.
    pub fn complete(mut self) {
        self.close(None);
    }

    /// Mark the request done, labelling unfinished candidates `aborted`.
    pub fn abort(mut self, message: &str) {
        self.close(Some(message));
    }

    fn close(&mut self, abort: Option<&str>) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut unfinished = 0usize;
        self.shared.data.send_modify(|data| {
            for output in data.outputs.iter_mut().filter(|o| !o.is_finished()) {
                output.finish(FinishReason::Aborted, None);
                unfinished += 1;
            }
            data.state = RequestState::Done;
        });

        match abort {
            Some(message) => warn!(
                prompt_bytes = self.shared.prompt.len(),
                unfinished,
                reason = message,
                "Request aborted"
            ),
            None if unfinished > 0 => warn!(
                unfinished,
                "Request completed with unfinished candidates, marking them aborted"
            ),
            None => debug!(candidates = self.candidates(), "Request completed"),
        }
    }
}

impl Drop for RequestOutputWriter {
    fn drop(&mut self) {
        if !self.closed {
            self.close(Some("producer dropped before completion"));
        }
    }
}
