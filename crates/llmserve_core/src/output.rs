//! Per-candidate generation output.

use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use serde::{Deserialize, Serialize};

/// Why a candidate stopped generating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// A stop token or stop string was produced.
    #[display("stop")]
    Stop,
    /// The token budget was exhausted.
    #[display("length")]
    Length,
    /// The producer gave up on the request.
    #[display("aborted")]
    Aborted,
}

/// The stop condition that ended a candidate, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(untagged)]
pub enum StopReason {
    /// Stop token id.
    #[display("{_0}")]
    TokenId(u32),
    /// Stop string.
    #[display("{_0}")]
    Text(String),
}

/// Tokens and text appended to one candidate by a single producer update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateDelta {
    /// Decoded text of the new tokens
    pub text: String,
    /// New token ids
    pub token_ids: Vec<u32>,
    /// Log-probabilities of the new tokens
    pub logprobs: Vec<f32>,
}

impl CandidateDelta {
    /// Create a delta from its parts.
    pub fn new(text: impl Into<String>, token_ids: Vec<u32>, logprobs: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            token_ids,
            logprobs,
        }
    }
}

/// Output of one generation candidate.
///
/// Cumulative fields (`text`, `token_ids`, `logprobs`) grow with every update; the
/// `*_diff` fields hold what the latest update appended. `length` always equals the
/// number of generated tokens.
///
/// Deserialization goes through [`OutputBuilder`], so decoded outputs are validated too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(try_from = "OutputBuilder")]
#[builder(
    setter(into),
    build_fn(validate = "Self::validate"),
    derive(Deserialize)
)]
pub struct Output {
    /// Position among the request's parallel candidates
    index: usize,
    /// Cumulative decoded text
    #[builder(default)]
    text: String,
    /// Text appended by the latest update
    #[builder(default)]
    text_diff: String,
    /// Cumulative generated token ids
    #[builder(default)]
    token_ids: Vec<u32>,
    /// Token ids appended by the latest update
    #[builder(default)]
    token_ids_diff: Vec<u32>,
    /// Log-probabilities parallel to `token_ids`
    #[builder(default)]
    logprobs: Vec<f32>,
    /// Log-probabilities parallel to `token_ids_diff`
    #[builder(default)]
    logprobs_diff: Vec<f32>,
    /// Current token count
    length: usize,
    /// Terminal label, set once the candidate stops
    #[builder(default)]
    finish_reason: Option<FinishReason>,
    /// Stop condition that ended the candidate
    #[builder(default)]
    stop_reason: Option<StopReason>,
}

impl OutputBuilder {
    fn validate(&self) -> Result<(), String> {
        check_fields(
            self.text.as_deref().unwrap_or_default(),
            self.text_diff.as_deref().unwrap_or_default(),
            self.token_ids.as_deref().unwrap_or_default(),
            self.token_ids_diff.as_deref().unwrap_or_default(),
            self.logprobs.as_deref().unwrap_or_default(),
            self.logprobs_diff.as_deref().unwrap_or_default(),
            self.length.unwrap_or_default(),
        )
    }
}

impl TryFrom<OutputBuilder> for Output {
    type Error = OutputBuilderError;

    fn try_from(builder: OutputBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn check_fields(
    text: &str,
    text_diff: &str,
    token_ids: &[u32],
    token_ids_diff: &[u32],
    logprobs: &[f32],
    logprobs_diff: &[f32],
    length: usize,
) -> Result<(), String> {
    if token_ids.len() != length {
        return Err(format!(
            "length {} does not match {} token ids",
            length,
            token_ids.len()
        ));
    }
    if logprobs.len() != token_ids.len() {
        return Err(format!(
            "{} logprobs for {} token ids",
            logprobs.len(),
            token_ids.len()
        ));
    }
    if logprobs_diff.len() != token_ids_diff.len() {
        return Err(format!(
            "{} logprob diffs for {} token id diffs",
            logprobs_diff.len(),
            token_ids_diff.len()
        ));
    }
    if !token_ids.ends_with(token_ids_diff) {
        return Err("token_ids_diff is not a suffix of token_ids".to_string());
    }
    if !text.ends_with(text_diff) {
        return Err("text_diff is not a suffix of text".to_string());
    }
    Ok(())
}

impl Output {
    /// Create a builder for an output.
    pub fn builder() -> OutputBuilder {
        OutputBuilder::default()
    }

    /// Empty, unfinished candidate at `index`.
    pub(crate) fn empty(index: usize) -> Self {
        Self {
            index,
            text: String::new(),
            text_diff: String::new(),
            token_ids: Vec::new(),
            token_ids_diff: Vec::new(),
            logprobs: Vec::new(),
            logprobs_diff: Vec::new(),
            length: 0,
            finish_reason: None,
            stop_reason: None,
        }
    }

    /// Position among the request's parallel candidates.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cumulative decoded text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text appended by the latest update.
    pub fn text_diff(&self) -> &str {
        &self.text_diff
    }

    /// Cumulative generated token ids.
    pub fn token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    /// Token ids appended by the latest update.
    pub fn token_ids_diff(&self) -> &[u32] {
        &self.token_ids_diff
    }

    /// Log-probabilities parallel to [`Self::token_ids`].
    pub fn logprobs(&self) -> &[f32] {
        &self.logprobs
    }

    /// Log-probabilities parallel to [`Self::token_ids_diff`].
    pub fn logprobs_diff(&self) -> &[f32] {
        &self.logprobs_diff
    }

    /// Current token count.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Terminal label, if the candidate has stopped.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Stop condition that ended the candidate, if any.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Whether the candidate has stopped generating.
    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Append a producer update, replacing the diff fields.
    ///
    /// Rejected updates leave the output untouched.
    pub(crate) fn apply(&mut self, delta: CandidateDelta) -> ServeResult<()> {
        if self.is_finished() {
            return Err(ServeError::new(ServeErrorKind::InvalidUpdate(format!(
                "candidate {} already finished",
                self.index
            ))));
        }
        if delta.token_ids.len() != delta.logprobs.len() {
            return Err(ServeError::new(ServeErrorKind::InvalidUpdate(format!(
                "candidate {}: {} logprobs for {} token ids",
                self.index,
                delta.logprobs.len(),
                delta.token_ids.len()
            ))));
        }

        self.text.push_str(&delta.text);
        self.token_ids.extend_from_slice(&delta.token_ids);
        self.logprobs.extend_from_slice(&delta.logprobs);
        self.text_diff = delta.text;
        self.token_ids_diff = delta.token_ids;
        self.logprobs_diff = delta.logprobs;
        self.length = self.token_ids.len();
        Ok(())
    }

    /// Mark the candidate finished. The first reason wins.
    pub(crate) fn finish(&mut self, reason: FinishReason, stop_reason: Option<StopReason>) {
        if self.finish_reason.is_none() {
            self.finish_reason = Some(reason);
            self.stop_reason = stop_reason;
        }
    }
}
