//! HTTP API: health, model listing and text completions.

use crate::error::ApiError;
use crate::request::CompletionRequest;
use crate::response::{
    CompletionChoice, CompletionChunk, CompletionResponse, ModelList, finish_label,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::StreamExt;
use llmserve_core::RequestOutput;
use llmserve_engine::{InferenceEngine, TextTokenizer};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    /// Engine that runs generation.
    pub engine: Arc<dyn InferenceEngine>,
    /// Tokenizer for the served model.
    pub tokenizer: Arc<dyn TextTokenizer>,
    /// Model identifier clients address.
    pub model: String,
    /// Largest `n` a completion request may ask for.
    pub max_candidates: usize,
    /// Unix timestamp the server started at.
    pub created: i64,
}

impl ServerState {
    /// Creates a new server state.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        tokenizer: Arc<dyn TextTokenizer>,
        model: impl Into<String>,
        max_candidates: usize,
    ) -> Self {
        Self {
            engine,
            tokenizer,
            model: model.into(),
            max_candidates,
            created: chrono::Utc::now().timestamp(),
        }
    }

    fn check_model(&self, requested: Option<&String>) -> Result<(), ApiError> {
        match requested {
            Some(model) if *model != self.model && model.as_str() != self.engine.model() => {
                Err(ApiError::model_not_found(model))
            }
            _ => Ok(()),
        }
    }
}

/// Creates the API router.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/models", get(list_models))
        .route("/v1/completions", post(create_completion))
        .with_state(state)
}

/// Health check endpoint; reports the engine as well as the server.
#[instrument(skip_all)]
async fn health_check(State(state): State<ServerState>) -> impl IntoResponse {
    match state.engine.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Err(e) => {
            warn!(error = %e, "Engine health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.kind().to_string() })),
            )
        }
    }
}

/// List the served model.
#[instrument(skip_all)]
async fn list_models(State(state): State<ServerState>) -> impl IntoResponse {
    Json(ModelList::single(state.model.clone(), state.created))
}

/// Text completion, as one JSON body or as server-sent events.
#[instrument(skip_all, fields(stream = request.is_streaming(), n = ?request.n()))]
async fn create_completion(
    State(state): State<ServerState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Response, ApiError> {
    state.check_model(request.model().as_ref())?;
    let generation = request.to_generation_request(state.max_candidates)?;

    let id = format!("cmpl-{}", uuid::Uuid::new_v4().simple());
    let created = chrono::Utc::now().timestamp();
    let output = state.engine.generate(generation).await?;
    debug!(id = %id, "Request submitted to engine");

    if request.is_streaming() {
        let events = completion_events(output, id, created, state.model.clone());
        return Ok(Sse::new(events)
            .keep_alive(KeepAlive::default())
            .into_response());
    }

    output.result().await;
    let snapshot = output.snapshot();
    let prompt_tokens = if snapshot.prompt_token_ids().is_empty() {
        state.tokenizer.encode(snapshot.prompt())?.len()
    } else {
        snapshot.prompt_token_ids().len()
    };
    let response =
        CompletionResponse::from_snapshot(id, created, state.model.clone(), &snapshot, prompt_tokens);
    info!(
        id = %response.id(),
        prompt_tokens,
        completion_tokens = response.usage().completion_tokens(),
        "Completion finished"
    );
    Ok(Json(response).into_response())
}

/// What has already been sent for one candidate.
#[derive(Debug, Default, Clone, Copy)]
struct Sent {
    text_len: usize,
    finished: bool,
}

/// Choices carrying everything new since the last call, advancing `sent`.
fn pending_choices(output: &RequestOutput, sent: &mut Vec<Sent>) -> Vec<CompletionChoice> {
    output.with_outputs(|outputs| {
        if sent.len() < outputs.len() {
            sent.resize(outputs.len(), Sent::default());
        }
        outputs
            .iter()
            .zip(sent.iter_mut())
            .filter_map(|(candidate, sent)| {
                let text = candidate.text().get(sent.text_len..).unwrap_or_default();
                let finish_reason = if sent.finished { None } else { finish_label(candidate) };
                if text.is_empty() && finish_reason.is_none() {
                    return None;
                }
                sent.text_len = candidate.text().len();
                sent.finished |= finish_reason.is_some();
                Some(CompletionChoice::new(candidate.index(), text, finish_reason))
            })
            .collect()
    })
}

/// SSE body for a streaming completion, ending with `data: [DONE]`.
fn completion_events(
    output: RequestOutput,
    id: String,
    created: i64,
    model: String,
) -> impl futures_util::Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    async_stream::stream! {
        let mut sent = Vec::new();
        let mut updates = output.stream();
        while let Some(update) = updates.next().await {
            let choices = pending_choices(&update, &mut sent);
            if !choices.is_empty() {
                yield Event::default().json_data(CompletionChunk::new(&id, created, &model, choices));
            }
        }

        let choices = pending_choices(&output, &mut sent);
        if !choices.is_empty() {
            yield Event::default().json_data(CompletionChunk::new(&id, created, &model, choices));
        }
        debug!(id = %id, "Completion stream finished");
        yield Ok(Event::default().data("[DONE]"));
    }
}
