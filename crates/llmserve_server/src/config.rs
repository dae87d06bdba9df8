//! Configuration for the HTTP front end

use derive_getters::Getters;

/// Where the server listens and which model it advertises
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    #[builder(default = "ServerConfig::DEFAULT_HOST.to_string()")]
    host: String,
    /// Port to bind
    #[builder(default = "ServerConfig::DEFAULT_PORT")]
    port: u16,
    /// Model identifier reported by `/v1/models` and in responses
    model: String,
    /// Largest `n` a completion request may ask for
    #[builder(default = "ServerConfig::DEFAULT_MAX_CANDIDATES")]
    max_candidates: usize,
}

impl ServerConfig {
    /// Default bind interface.
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    /// Default bind port.
    pub const DEFAULT_PORT: u16 = 8000;
    /// Default cap on candidates per request.
    pub const DEFAULT_MAX_CANDIDATES: usize = 128;

    /// Create a new builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
