use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
use futures_util::StreamExt;
use llmserve_core::{FinishReason, GenerationRequest, RequestState};
use llmserve_engine::{EngineClient, InferenceEngine};
use llmserve_error::ServeErrorKind;
use serde_json::Value;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

/// Stand-in executor that replays a canned event stream per prompt.
async fn generate_stream(Json(body): Json<Value>) -> (StatusCode, String) {
    let n = body["n"].as_u64().unwrap_or(1);
    match body["prompt"].as_str().unwrap_or_default() {
        "reject" => (StatusCode::SERVICE_UNAVAILABLE, "queue full".to_string()),
        "crash" => (
            StatusCode::OK,
            [
                r#"{"type":"prompt","token_ids":[7]}"#,
                r#"{"type":"delta","index":0,"text":"par","token_ids":[11],"logprobs":[-0.5]}"#,
                r#"{"type":"error","message":"device lost"}"#,
            ]
            .join("\n"),
        ),
        "truncated" => (
            StatusCode::OK,
            [
                r#"{"type":"prompt","token_ids":[8]}"#,
                r#"{"type":"delta","index":0,"text":"half","token_ids":[12],"logprobs":[-0.3]}"#,
            ]
            .join("\n"),
        ),
        _ => {
            let mut lines = vec![r#"{"type":"prompt","token_ids":[5,6]}"#.to_string()];
            for index in 0..n {
                lines.push(format!(
                    r#"{{"type":"delta","index":{index},"text":"Hi","token_ids":[20],"logprobs":[-0.1]}}"#
                ));
                lines.push(format!(
                    r#"{{"type":"delta","index":{index},"text":" there","token_ids":[21],"logprobs":[-0.2]}}"#
                ));
                lines.push(format!(
                    r#"{{"type":"finish","index":{index},"finish_reason":"length"}}"#
                ));
            }
            (StatusCode::OK, lines.join("\n") + "\n")
        }
    }
}

async fn spawn_executor() -> String {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/generate_stream", post(generate_stream));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake executor");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake executor");
    });
    format!("http://{addr}/")
}

fn client(base_url: String) -> EngineClient {
    EngineClient::new(base_url, "tiny-model").with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_generate_accumulates_all_candidates() {
    let engine = client(spawn_executor().await);
    assert!(!engine.base_url().ends_with('/'));
    engine.health_check().await.expect("fake executor is healthy");

    let request = GenerationRequest::builder()
        .prompt("Hello")
        .n(2usize)
        .max_tokens(Some(2u32))
        .build()
        .expect("valid request");
    let output = engine.generate(request).await.expect("request accepted");
    output.result_timeout(WAIT).await.expect("request completes");

    let snapshot = output.snapshot();
    assert_eq!(snapshot.state(), &RequestState::Done);
    assert_eq!(snapshot.prompt(), "Hello");
    assert_eq!(snapshot.prompt_token_ids(), &vec![5, 6]);
    assert_eq!(snapshot.outputs().len(), 2);
    for (index, candidate) in snapshot.outputs().iter().enumerate() {
        assert_eq!(candidate.index(), index);
        assert_eq!(candidate.text(), "Hi there");
        assert_eq!(candidate.token_ids(), &[20, 21]);
        assert_eq!(candidate.length(), 2);
        assert_eq!(candidate.finish_reason(), Some(FinishReason::Length));
    }
}

#[tokio::test]
async fn test_stream_ends_after_engine_finishes() {
    let engine = client(spawn_executor().await);
    let output = engine
        .generate(GenerationRequest::new("Hello"))
        .await
        .expect("request accepted");

    let updates = tokio::time::timeout(WAIT, output.stream().count())
        .await
        .expect("stream terminates");
    assert!(updates <= 100);
    assert!(output.is_done());
    assert_eq!(output.outputs()[0].text(), "Hi there");
}

#[tokio::test]
async fn test_executor_error_event_aborts_request() {
    let engine = client(spawn_executor().await);
    let output = engine
        .generate(GenerationRequest::new("crash"))
        .await
        .expect("request accepted");
    output.result_timeout(WAIT).await.expect("aborted requests complete");

    let outputs = output.outputs();
    assert!(output.is_done());
    assert_eq!(output.prompt_token_ids(), vec![7]);
    assert_eq!(outputs[0].text(), "par");
    assert_eq!(outputs[0].finish_reason(), Some(FinishReason::Aborted));
}

#[tokio::test]
async fn test_stream_without_finish_events_aborts_open_candidates() {
    let engine = client(spawn_executor().await);
    let request = GenerationRequest::builder()
        .prompt("truncated")
        .n(2usize)
        .build()
        .expect("valid request");
    let output = engine.generate(request).await.expect("request accepted");
    output.result_timeout(WAIT).await.expect("request completes");

    let outputs = output.outputs();
    assert!(output.is_done());
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].text(), "half");
    assert!(
        outputs
            .iter()
            .all(|candidate| candidate.finish_reason() == Some(FinishReason::Aborted))
    );
}

#[tokio::test]
async fn test_rejected_request_is_an_engine_error() {
    let engine = client(spawn_executor().await);
    let err = engine
        .generate(GenerationRequest::new("reject"))
        .await
        .expect_err("executor rejects the prompt");

    match err.kind() {
        ServeErrorKind::Engine(message) => assert!(message.contains("queue full")),
        other => panic!("unexpected error kind: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_executor_fails_health_check() {
    let engine = client("http://127.0.0.1:1".to_string());
    let err = engine.health_check().await.expect_err("nothing listens there");

    assert!(matches!(err.kind(), ServeErrorKind::Http(_)));
}
