//! Engine side of llmserve.
//!
//! The inference engine itself runs as an external executor process. This crate
//! configures and launches it, authenticates to the model hub, loads the tokenizer,
//! and turns the executor's event stream into [`llmserve_core::RequestOutput`]s.

mod client;
mod config;
mod hub;
mod launcher;
mod tokenizer;
mod traits;
mod wire;

pub use client::EngineClient;
pub use config::{
    BuildConfig, BuildConfigBuilder, BuildConfigBuilderError, EngineConfig, EngineConfigBuilder,
    EngineConfigBuilderError, KvCacheConfig,
};
pub use hub::{HF_TOKEN_ENV, HubAuth, HubClient, hub_login};
pub use launcher::{
    ExecutorConfig, ExecutorConfigBuilder, ExecutorConfigBuilderError, ExecutorLauncher,
    ExecutorProcess,
};
pub use tokenizer::HfTokenizer;
pub use traits::{EngineLauncher, EngineProcess, InferenceEngine, TextTokenizer};
pub use wire::{EngineEvent, LineBuffer};
