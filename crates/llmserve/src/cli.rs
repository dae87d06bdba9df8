//! Command-line arguments for `llm-serve`.

use clap::Parser;
use llmserve_engine::{BuildConfig, EngineConfig, ExecutorConfig, HubAuth, KvCacheConfig};
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use llmserve_server::ServerConfig;
use std::time::Duration;

/// Serve a large language model over an OpenAI-compatible HTTP API.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "llm-serve")]
#[command(about = "Serve a large language model over an OpenAI-compatible HTTP API")]
#[command(version)]
pub struct Cli {
    /// Model name, hub checkpoint id or engine directory
    pub model: String,

    /// Tokenizer name or path (defaults to the model)
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Interface for the HTTP server
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    pub host: String,

    /// Port for the HTTP server
    #[arg(long, default_value_t = ServerConfig::DEFAULT_PORT)]
    pub port: u16,

    /// Maximum beams for beam search decoding
    #[arg(long = "max_beam_width", default_value_t = BuildConfig::DEFAULT_MAX_BEAM_WIDTH)]
    pub max_beam_width: usize,

    /// Maximum number of requests the engine can schedule
    #[arg(long = "max_batch_size", default_value_t = BuildConfig::DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,

    /// Maximum batched input tokens after padding removal
    #[arg(long = "max_num_tokens", default_value_t = BuildConfig::DEFAULT_MAX_NUM_TOKENS)]
    pub max_num_tokens: usize,

    /// Maximum total length of one request; deduced from the model config when unset
    #[arg(long = "max_seq_len")]
    pub max_seq_len: Option<usize>,

    /// Tensor parallelism size
    #[arg(long = "tp_size", default_value_t = 1)]
    pub tp_size: usize,

    /// Pipeline parallelism size
    #[arg(long = "pp_size", default_value_t = 1)]
    pub pp_size: usize,

    /// Fraction of free GPU memory reserved for the KV cache after loading weights
    #[arg(
        long = "kv_cache_free_gpu_memory_fraction",
        default_value_t = KvCacheConfig::DEFAULT_FREE_GPU_MEMORY_FRACTION
    )]
    pub kv_cache_free_gpu_memory_fraction: f32,

    /// Allow custom code from the model repository
    #[arg(long = "trust_remote_code")]
    pub trust_remote_code: bool,

    /// Largest number of candidates (`n`) one completion request may ask for
    #[arg(long, default_value_t = ServerConfig::DEFAULT_MAX_CANDIDATES)]
    pub max_candidates: usize,

    /// Connect to an already running executor instead of launching one
    #[arg(long, env = "LLMSERVE_ENGINE_URL")]
    pub engine_url: Option<String>,

    /// Executor program to launch
    #[arg(long, default_value = ExecutorConfig::DEFAULT_COMMAND)]
    pub engine_command: String,

    /// Port for the launched executor
    #[arg(long, default_value_t = ExecutorConfig::DEFAULT_PORT)]
    pub engine_port: u16,

    /// Seconds to wait for the launched executor to become ready
    #[arg(long, default_value_t = 600)]
    pub engine_startup_timeout: u64,

    /// Idle wake-up interval of result streaming, in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Engine configuration described by the arguments.
    pub fn engine_config(&self) -> ServeResult<EngineConfig> {
        let fraction = self.kv_cache_free_gpu_memory_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ServeError::new(ServeErrorKind::Config(format!(
                "kv_cache_free_gpu_memory_fraction must be in (0, 1], got {fraction}"
            ))));
        }

        let build_config = BuildConfig::builder()
            .max_beam_width(self.max_beam_width)
            .max_batch_size(self.max_batch_size)
            .max_num_tokens(self.max_num_tokens)
            .max_seq_len(self.max_seq_len)
            .build()
            .map_err(|e| ServeError::new(ServeErrorKind::Config(e.to_string())))?;

        EngineConfig::builder()
            .model(self.model.clone())
            .tokenizer(self.tokenizer.clone())
            .tensor_parallel_size(self.tp_size)
            .pipeline_parallel_size(self.pp_size)
            .trust_remote_code(self.trust_remote_code)
            .build_config(build_config)
            .kv_cache_config(KvCacheConfig::new(fraction))
            .build()
            .map_err(|e| ServeError::new(ServeErrorKind::Config(e.to_string())))
    }

    /// Launch settings for a local executor running `engine`.
    pub fn executor_config(&self, engine: EngineConfig, auth: HubAuth) -> ServeResult<ExecutorConfig> {
        ExecutorConfig::builder()
            .command(self.engine_command.clone())
            .port(self.engine_port)
            .engine(engine)
            .auth(auth)
            .build()
            .map_err(|e| ServeError::new(ServeErrorKind::Config(e.to_string())))
    }

    /// HTTP server settings.
    pub fn server_config(&self) -> ServeResult<ServerConfig> {
        ServerConfig::builder()
            .host(self.host.clone())
            .port(self.port)
            .model(self.model.clone())
            .max_candidates(self.max_candidates)
            .build()
            .map_err(|e| ServeError::new(ServeErrorKind::Config(e.to_string())))
    }

    /// Idle wake-up interval for request accumulators.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Bound on executor startup.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_startup_timeout)
    }
}
