//! Engine build and runtime configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Engine build limits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct BuildConfig {
    /// Maximum number of requests the engine can schedule at once
    #[builder(default = "BuildConfig::DEFAULT_MAX_BATCH_SIZE")]
    max_batch_size: usize,
    /// Maximum batched input tokens after padding removal
    #[builder(default = "BuildConfig::DEFAULT_MAX_NUM_TOKENS")]
    max_num_tokens: usize,
    /// Maximum beams for beam search decoding
    #[builder(default = "BuildConfig::DEFAULT_MAX_BEAM_WIDTH")]
    max_beam_width: usize,
    /// Maximum prompt + output length; deduced from the model config when unset
    #[builder(default)]
    max_seq_len: Option<usize>,
}

impl BuildConfig {
    /// Default scheduling capacity.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 2048;
    /// Default batched token budget.
    pub const DEFAULT_MAX_NUM_TOKENS: usize = 8192;
    /// Default beam width (greedy/sampling only).
    pub const DEFAULT_MAX_BEAM_WIDTH: usize = 1;

    /// Create a new builder.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            max_num_tokens: Self::DEFAULT_MAX_NUM_TOKENS,
            max_beam_width: Self::DEFAULT_MAX_BEAM_WIDTH,
            max_seq_len: None,
        }
    }
}

/// KV cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct KvCacheConfig {
    /// Fraction of free GPU memory reserved for the KV cache after weights and buffers
    free_gpu_memory_fraction: f32,
}

impl KvCacheConfig {
    /// Default reserved fraction.
    pub const DEFAULT_FREE_GPU_MEMORY_FRACTION: f32 = 0.9;

    /// Reserve `free_gpu_memory_fraction` of free GPU memory.
    pub fn new(free_gpu_memory_fraction: f32) -> Self {
        Self {
            free_gpu_memory_fraction,
        }
    }
}

impl Default for KvCacheConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FREE_GPU_MEMORY_FRACTION)
    }
}

/// Everything needed to construct an engine for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct EngineConfig {
    /// Model name, hub checkpoint id or engine directory
    model: String,
    /// Tokenizer name or path, when it differs from the model
    #[builder(default)]
    tokenizer: Option<String>,
    /// Tensor parallelism degree
    #[builder(default = "1")]
    tensor_parallel_size: usize,
    /// Pipeline parallelism degree
    #[builder(default = "1")]
    pipeline_parallel_size: usize,
    /// Allow the model repository to ship custom code
    #[builder(default)]
    trust_remote_code: bool,
    /// Build limits
    #[builder(default)]
    build_config: BuildConfig,
    /// KV cache sizing
    #[builder(default)]
    kv_cache_config: KvCacheConfig,
}

impl EngineConfig {
    /// Create a new builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Where the tokenizer is loaded from: the explicit tokenizer, else the model.
    pub fn tokenizer_source(&self) -> &str {
        self.tokenizer.as_deref().unwrap_or(&self.model)
    }

    /// Render the configuration as executor command-line flags.
    pub fn executor_args(&self) -> Vec<String> {
        let mut args = vec![self.model.clone()];
        if let Some(tokenizer) = &self.tokenizer {
            args.push("--tokenizer".to_string());
            args.push(tokenizer.clone());
        }

        let build = &self.build_config;
        let mut flag = |name: &str, value: String| {
            args.push(format!("--{name}"));
            args.push(value);
        };
        flag("max_beam_width", build.max_beam_width.to_string());
        flag("max_batch_size", build.max_batch_size.to_string());
        flag("max_num_tokens", build.max_num_tokens.to_string());
        if let Some(max_seq_len) = build.max_seq_len {
            flag("max_seq_len", max_seq_len.to_string());
        }
        flag("tp_size", self.tensor_parallel_size.to_string());
        flag("pp_size", self.pipeline_parallel_size.to_string());
        flag(
            "kv_cache_free_gpu_memory_fraction",
            self.kv_cache_config.free_gpu_memory_fraction.to_string(),
        );

        if self.trust_remote_code {
            args.push("--trust_remote_code".to_string());
        }
        args
    }
}
