//! OpenAI-compatible HTTP front end for llmserve.
//!
//! Exposes `GET /health`, `GET /v1/models` and `POST /v1/completions` over any
//! [`llmserve_engine::InferenceEngine`]. Streaming completions are server-sent events
//! built by streaming the request's [`llmserve_core::RequestOutput`].

mod api;
mod config;
mod error;
mod request;
mod response;
mod server;

pub use api::{ServerState, create_router};
pub use config::{ServerConfig, ServerConfigBuilder, ServerConfigBuilderError};
pub use error::ApiError;
pub use request::{CompletionRequest, CompletionRequestBuilder, CompletionRequestBuilderError, StopSequences};
pub use response::{
    CompletionChoice, CompletionChunk, CompletionResponse, ModelCard, ModelList, Usage,
};
pub use server::OpenAiServer;
