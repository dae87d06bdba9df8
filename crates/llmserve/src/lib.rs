//! `llm-serve`: launch an inference engine and serve it over HTTP.
//!
//! The binary maps its command line onto an engine configuration, logs in to the
//! model hub when `HF_TOKEN` is available, starts (or connects to) the engine executor,
//! loads the tokenizer and hands both to the OpenAI-compatible server.

mod bootstrap;
mod cli;
mod observability;

pub use bootstrap::run;
pub use cli::Cli;
pub use observability::init_tracing;
