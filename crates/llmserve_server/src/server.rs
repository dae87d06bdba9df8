//! Binding and running the HTTP server.

use crate::api::{ServerState, create_router};
use crate::config::ServerConfig;
use axum::Router;
use llmserve_engine::{InferenceEngine, TextTokenizer};
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// OpenAI-compatible server over an engine and its tokenizer.
pub struct OpenAiServer {
    config: ServerConfig,
    state: ServerState,
}

impl OpenAiServer {
    /// Server for `config`, answering with `engine` and `tokenizer`.
    pub fn new(
        config: ServerConfig,
        engine: Arc<dyn InferenceEngine>,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Self {
        let state = ServerState::new(
            engine,
            tokenizer,
            config.model().clone(),
            *config.max_candidates(),
        );
        Self { config, state }
    }

    /// The configuration the server was created with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Router with every endpoint mounted.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            ServeError::new(ServeErrorKind::Http(format!("Failed to bind {address}: {e}")))
        })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = listener.local_addr()?;
        info!(%address, model = %self.config.model(), "HTTP server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServeError::new(ServeErrorKind::Http(format!("Server error: {e}"))))?;
        info!("HTTP server stopped");
        Ok(())
    }
}
