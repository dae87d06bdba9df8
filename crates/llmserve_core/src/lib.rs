//! Core types for llmserve.
//!
//! - [`Output`]: results of one generation candidate
//! - [`RequestOutput`] / [`RequestOutputWriter`]: the per-request accumulator shared
//!   between the producing engine and its consumers
//! - [`GenerationRequest`]: what gets submitted to an engine

mod output;
mod request;
mod request_output;

pub use output::{CandidateDelta, FinishReason, Output, OutputBuilder, OutputBuilderError, StopReason};
pub use request::{GenerationRequest, GenerationRequestBuilder, GenerationRequestBuilderError};
pub use request_output::{
    DEFAULT_POLL_INTERVAL, RequestOutput, RequestOutputWriter, RequestSnapshot, RequestState,
};
