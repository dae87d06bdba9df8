//! Generation requests submitted to an inference engine.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A prompt plus the sampling parameters for generating from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct GenerationRequest {
    /// Input prompt text
    prompt: String,
    /// Number of parallel candidates to generate
    #[builder(default = "1")]
    #[serde(default = "default_n")]
    n: usize,
    /// Maximum tokens to generate per candidate
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Nucleus sampling threshold
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    /// Top-k sampling cutoff
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    /// Beam width for beam search (1 disables it)
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    beam_width: Option<u32>,
    /// Stop strings
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

fn default_n() -> usize {
    1
}

impl GenerationRequest {
    /// Request a single candidate for `prompt` with engine-default sampling.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n: default_n(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            beam_width: None,
            stop: Vec::new(),
        }
    }

    /// Create a new builder.
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }
}
