//! HTTP client for a running engine executor.

use crate::traits::InferenceEngine;
use crate::wire::{EngineEvent, LineBuffer};
use async_trait::async_trait;
use llmserve_core::{DEFAULT_POLL_INTERVAL, GenerationRequest, RequestOutput, RequestOutputWriter};
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{Instrument, debug, error, info_span, instrument};

/// Engine handle backed by an executor's HTTP streaming endpoint.
///
/// Every accepted request gets a background task that reads the executor's event
/// stream into the request's accumulator and completes it when the stream ends.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: Client,
    base_url: String,
    model: String,
    poll_interval: Duration,
}

impl EngineClient {
    /// Client for the executor at `base_url` serving `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Idle wake-up interval for the accumulators this client creates.
    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    /// Executor base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceEngine for EngineClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, n = *request.n()))]
    async fn generate(&self, request: GenerationRequest) -> ServeResult<RequestOutput> {
        let url = format!("{}/generate_stream", self.base_url);
        debug!(url = %url, "Submitting generation request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Executor request failed");
                ServeError::new(ServeErrorKind::Http(format!("Request failed: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Executor rejected request");
            return Err(ServeError::new(ServeErrorKind::Engine(format!(
                "Executor returned {status}: {body}"
            ))));
        }

        let (mut writer, reader) =
            RequestOutput::channel_with_interval(request.prompt().clone(), self.poll_interval);
        writer.init_candidates(*request.n());

        let span = info_span!("engine_stream", model = %self.model);
        tokio::spawn(
            async move {
                let pumped = pump_events(response, &mut writer).await;
                match pumped {
                    Ok(()) if writer.all_finished() => writer.complete(),
                    Ok(()) => {
                        writer.abort("executor stream ended before every candidate finished")
                    }
                    Err(e) => {
                        error!(error = %e, "Executor stream failed");
                        writer.abort(&e.to_string());
                    }
                }
            }
            .instrument(span),
        );

        Ok(reader)
    }

    async fn health_check(&self) -> ServeResult<()> {
        check_health(&self.client, &self.base_url).await
    }
}

/// Read NDJSON events from `response` into `writer` until the body ends.
async fn pump_events(
    mut response: reqwest::Response,
    writer: &mut RequestOutputWriter,
) -> ServeResult<()> {
    let mut lines = LineBuffer::default();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ServeError::new(ServeErrorKind::Http(format!("Stream error: {e}"))))?
    {
        for line in lines.push(&chunk)? {
            EngineEvent::parse(&line)?.apply(writer)?;
        }
    }
    if let Some(line) = lines.finish()? {
        EngineEvent::parse(&line)?.apply(writer)?;
    }
    Ok(())
}

/// `GET {base_url}/health`, succeeding on any 2xx.
pub(crate) async fn check_health(client: &Client, base_url: &str) -> ServeResult<()> {
    let response = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .map_err(|e| ServeError::new(ServeErrorKind::Http(format!("Health check failed: {e}"))))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ServeError::new(ServeErrorKind::Engine(format!(
            "Executor unhealthy: {status}"
        ))))
    }
}
