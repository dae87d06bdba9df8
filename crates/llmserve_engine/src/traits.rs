//! Trait interfaces for the engine side of llmserve.
//!
//! - [`InferenceEngine`] - submit generation requests, receive accumulators
//! - [`TextTokenizer`] - encode and decode text for the served model
//! - [`EngineProcess`] - lifecycle and health of a running executor
//! - [`EngineLauncher`] - executor creation and initialization

use async_trait::async_trait;
use llmserve_core::{GenerationRequest, RequestOutput};
use llmserve_error::ServeResult;
use std::time::Duration;

/// An inference engine that accepts prompts and produces streaming results.
///
/// Implementations must drive every returned [`RequestOutput`] to completion, including
/// when generation fails on their side.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Model identifier the engine serves.
    fn model(&self) -> &str;

    /// Submit a request and return the accumulator the engine will populate.
    async fn generate(&self, request: GenerationRequest) -> ServeResult<RequestOutput>;

    /// Check that the engine is reachable and ready for requests.
    async fn health_check(&self) -> ServeResult<()>;
}

/// Tokenizer for the served model.
pub trait TextTokenizer: Send + Sync {
    /// Token ids for `text`, including the model's special tokens.
    fn encode(&self, text: &str) -> ServeResult<Vec<u32>>;

    /// Text for `token_ids`, skipping special tokens.
    fn decode(&self, token_ids: &[u32]) -> ServeResult<String>;
}

/// Trait for managing the lifecycle of an engine executor process
#[async_trait]
pub trait EngineProcess: Send + Sync {
    /// Get the port the executor is listening on
    fn port(&self) -> u16;

    /// Get the base URL of the executor (e.g., "http://127.0.0.1:8001")
    fn base_url(&self) -> String;

    /// Check if the executor is healthy and responding to requests
    async fn health_check(&self) -> ServeResult<()>;

    /// Wait for the executor to become ready, with timeout
    ///
    /// Polls the health endpoint until it responds successfully, the process exits,
    /// or the timeout is reached.
    async fn wait_until_ready(&self, timeout: Duration) -> ServeResult<()>;

    /// Stop the executor
    ///
    /// Consumes self to ensure the executor can only be stopped once.
    fn stop(self) -> ServeResult<()>;
}

/// Trait for launching engine executors
pub trait EngineLauncher: Send + Sync {
    /// The type of process this launcher creates
    type Process: EngineProcess;

    /// Configuration required to start the process
    type Config;

    /// Start a new executor with the given configuration
    fn start(config: Self::Config) -> ServeResult<Self::Process>;
}
