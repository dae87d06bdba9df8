use derive_getters::Getters;
use llmserve_core::{Output, RequestSnapshot};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible text completion response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
pub struct CompletionResponse {
    /// Unique identifier for the completion
    id: String,
    /// Object type (always "text_completion")
    object: String,
    /// Unix timestamp of when the completion was created
    created: i64,
    /// Model used for completion
    model: String,
    /// Generated completions
    choices: Vec<CompletionChoice>,
    /// Token usage statistics
    usage: Usage,
}

impl CompletionResponse {
    /// Build the response for a finished request.
    pub fn from_snapshot(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        snapshot: &RequestSnapshot,
        prompt_tokens: usize,
    ) -> Self {
        let completion_tokens: usize = snapshot.outputs().iter().map(Output::length).sum();
        Self {
            id: id.into(),
            object: "text_completion".to_string(),
            created,
            model: model.into(),
            choices: snapshot
                .outputs()
                .iter()
                .map(|output| CompletionChoice::new(output.index(), output.text(), finish_label(output)))
                .collect(),
            usage: Usage::new(prompt_tokens, completion_tokens),
        }
    }
}

/// A completion choice, used by both full responses and streaming chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Getters)]
pub struct CompletionChoice {
    /// Index of this choice
    index: usize,
    /// Generated text (the increment, in a streaming chunk)
    text: String,
    /// Reason why generation finished
    finish_reason: Option<String>,
}

impl CompletionChoice {
    /// Create a choice.
    pub fn new(index: usize, text: impl Into<String>, finish_reason: Option<String>) -> Self {
        Self {
            index,
            text: text.into(),
            finish_reason,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Getters)]
pub struct Usage {
    /// Tokens in the prompt
    prompt_tokens: usize,
    /// Tokens across all completions
    completion_tokens: usize,
    /// Total tokens used
    total_tokens: usize,
}

impl Usage {
    /// Usage for the given prompt and completion token counts.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Streaming text completion chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters)]
pub struct CompletionChunk {
    /// Unique identifier, shared by every chunk of one request
    id: String,
    /// Object type (always "text_completion")
    object: String,
    /// Unix timestamp
    created: i64,
    /// Model used
    model: String,
    /// Incremental choices
    choices: Vec<CompletionChoice>,
}

impl CompletionChunk {
    /// Create a chunk.
    pub fn new(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        choices: Vec<CompletionChoice>,
    ) -> Self {
        Self {
            id: id.into(),
            object: "text_completion".to_string(),
            created,
            model: model.into(),
            choices,
        }
    }
}

/// `GET /v1/models` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Getters)]
pub struct ModelList {
    /// Object type (always "list")
    object: String,
    /// Available models
    data: Vec<ModelCard>,
}

impl ModelList {
    /// A list holding the single served model.
    pub fn single(model: impl Into<String>, created: i64) -> Self {
        Self {
            object: "list".to_string(),
            data: vec![ModelCard {
                id: model.into(),
                object: "model".to_string(),
                created,
                owned_by: "llmserve".to_string(),
            }],
        }
    }
}

/// One served model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Getters)]
pub struct ModelCard {
    /// Model identifier
    id: String,
    /// Object type (always "model")
    object: String,
    /// Unix timestamp
    created: i64,
    /// Owner label
    owned_by: String,
}

pub(crate) fn finish_label(output: &Output) -> Option<String> {
    output.finish_reason().map(|reason| reason.to_string())
}
