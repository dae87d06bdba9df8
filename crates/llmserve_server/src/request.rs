use derive_getters::Getters;
use llmserve_core::GenerationRequest;
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible text completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct CompletionRequest {
    /// Model identifier; the served model when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    model: Option<String>,
    /// Prompt text
    prompt: String,
    /// Number of completions to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    n: Option<usize>,
    /// Maximum tokens to generate per completion
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    temperature: Option<f32>,
    /// Top-p sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    top_p: Option<f32>,
    /// Top-k sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    top_k: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    stop: Option<StopSequences>,
    /// Enable streaming mode
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    stream: Option<bool>,
}

impl CompletionRequest {
    /// Create a new builder.
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// Whether the client asked for server-sent events.
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Engine request for this completion, allowing at most `max_candidates` choices.
    pub fn to_generation_request(&self, max_candidates: usize) -> ServeResult<GenerationRequest> {
        let n = self.n.unwrap_or(1);
        if n == 0 {
            return Err(ServeError::new(ServeErrorKind::InvalidRequest(
                "n must be at least 1".into(),
            )));
        }
        if n > max_candidates {
            return Err(ServeError::new(ServeErrorKind::InvalidRequest(format!(
                "n must be at most {max_candidates}, got {n}"
            ))));
        }
        if self.prompt.is_empty() {
            return Err(ServeError::new(ServeErrorKind::InvalidRequest(
                "prompt must not be empty".into(),
            )));
        }

        GenerationRequest::builder()
            .prompt(self.prompt.clone())
            .n(n)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .top_p(self.top_p)
            .top_k(self.top_k)
            .stop(
                self.stop
                    .clone()
                    .map(StopSequences::into_vec)
                    .unwrap_or_default(),
            )
            .build()
            .map_err(|e| ServeError::new(ServeErrorKind::InvalidRequest(e.to_string())))
    }
}

/// `stop` accepts either one string or a list of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum StopSequences {
    /// A single stop string
    One(String),
    /// Several stop strings
    Many(Vec<String>),
}

impl StopSequences {
    /// Flatten into a list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(stop) => vec![stop],
            Self::Many(stops) => stops,
        }
    }
}
