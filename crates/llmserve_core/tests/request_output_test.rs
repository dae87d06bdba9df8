//! Tests for the request accumulator's streaming and terminal consumption.

use futures_util::StreamExt;
use llmserve_core::{
    CandidateDelta, FinishReason, RequestOutput, RequestState, StopReason,
};
use llmserve_error::ServeErrorKind;
use std::time::Duration;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_millis(100);

fn delta(text: &str, token_ids: Vec<u32>, logprobs: Vec<f32>) -> CandidateDelta {
    CandidateDelta::new(text, token_ids, logprobs)
}

#[tokio::test(start_paused = true)]
async fn test_stream_ends_within_one_interval_of_completion() {
    let (mut writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);
    writer.init_candidates(1);

    let producer = tokio::spawn(async move {
        for token in 0..3u32 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            writer
                .append(0, delta("x", vec![token], vec![-0.5]))
                .expect("valid delta");
        }
        writer
            .finish_candidate(0, FinishReason::Length, None)
            .expect("known candidate");
        writer.complete();
        Instant::now()
    });

    let mut stream = reader.stream();
    let mut yields = 0;
    while stream.next().await.is_some() {
        yields += 1;
    }
    let ended = Instant::now();
    let completed = producer.await.expect("producer task");

    assert!(ended.duration_since(completed) <= INTERVAL);
    assert!(yields >= 3, "expected several wake-ups, got {yields}");
    assert!(reader.is_done());

    let outputs = reader.outputs();
    assert_eq!(outputs[0].text(), "xxx");
    assert_eq!(outputs[0].token_ids(), &[0, 1, 2]);
    assert_eq!(outputs[0].finish_reason(), Some(FinishReason::Length));
}

#[tokio::test(start_paused = true)]
async fn test_result_resumes_within_one_interval_of_completion() {
    let (mut writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);
    writer.init_candidates(2);

    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(730)).await;
        writer
            .append(0, delta("a", vec![1], vec![-0.1]))
            .expect("valid delta");
        writer
            .append(1, delta("b", vec![2], vec![-0.2]))
            .expect("valid delta");
        writer
            .finish_candidate(0, FinishReason::Stop, Some(StopReason::TokenId(2)))
            .expect("known candidate");
        writer
            .finish_candidate(1, FinishReason::Stop, None)
            .expect("known candidate");
        writer.complete();
        Instant::now()
    });

    reader.result().await;
    let resumed = Instant::now();
    let completed = producer.await.expect("producer task");

    assert!(resumed.duration_since(completed) <= INTERVAL);
    assert_eq!(reader.state(), RequestState::Done);
    let outputs = reader.outputs();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].stop_reason(), Some(&StopReason::TokenId(2)));
    assert_eq!(outputs[1].text(), "b");
}

#[tokio::test(start_paused = true)]
async fn test_yields_share_the_accumulator() {
    let (mut writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);
    writer.init_candidates(1);

    let mut stream = reader.stream();
    let first = stream.next().await.expect("pending request yields");
    assert!(first.is_same(&reader));
    assert_eq!(first.outputs()[0].length(), 0);

    writer
        .append(0, delta(" world", vec![42], vec![-0.25]))
        .expect("valid delta");

    let second = stream.next().await.expect("pending request yields");
    assert!(second.is_same(&reader));
    assert_eq!(second.outputs()[0].token_ids(), &[42]);
    // The earlier handle is a view, not a copy.
    assert_eq!(first.outputs()[0].text(), " world");
}

#[tokio::test(start_paused = true)]
async fn test_idle_request_yields_every_interval() {
    let (_writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);

    let yields = tokio::time::timeout(INTERVAL * 3, reader.stream().take(3).count())
        .await
        .expect("three yields within three intervals");

    assert_eq!(yields, 3);
    assert!(!reader.is_done());
}

#[tokio::test(start_paused = true)]
async fn test_completed_request_yields_nothing() {
    let (mut writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);
    writer.init_candidates(1);
    writer
        .finish_candidate(0, FinishReason::Stop, None)
        .expect("known candidate");
    writer.complete();

    let start = Instant::now();
    assert_eq!(reader.stream().count().await, 0);
    tokio::time::timeout(INTERVAL, reader.result())
        .await
        .expect("result resumes immediately");
    assert_eq!(Instant::now(), start);
}

#[tokio::test(start_paused = true)]
async fn test_result_timeout_on_pending_request() {
    let (_writer, reader) = RequestOutput::channel_with_interval("Hello", INTERVAL);

    let err = reader
        .result_timeout(Duration::from_secs(2))
        .await
        .expect_err("request never completes");

    assert_eq!(err.kind(), &ServeErrorKind::Timeout(Duration::from_secs(2)));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_writer_aborts_request() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(2);
    writer
        .finish_candidate(1, FinishReason::Stop, Some(StopReason::Text("\n".into())))
        .expect("known candidate");

    let waiter = tokio::spawn({
        let reader = reader.clone();
        async move { reader.result().await }
    });
    drop(writer);
    waiter.await.expect("waiter resumes");

    let outputs = reader.outputs();
    assert!(reader.is_done());
    assert_eq!(outputs[0].finish_reason(), Some(FinishReason::Aborted));
    assert_eq!(outputs[1].finish_reason(), Some(FinishReason::Stop));
}

#[test]
fn test_rejected_updates_leave_outputs_unchanged() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(1);
    writer
        .append(0, delta("a", vec![1], vec![-0.1]))
        .expect("valid delta");

    let err = writer
        .append(0, delta("b", vec![2, 3], vec![-0.2]))
        .expect_err("mismatched logprobs");
    assert!(matches!(err.kind(), ServeErrorKind::InvalidUpdate(_)));

    let err = writer
        .append(4, delta("c", vec![5], vec![-0.5]))
        .expect_err("no such candidate");
    assert_eq!(
        err.kind(),
        &ServeErrorKind::UnknownCandidate {
            index: 4,
            candidates: 1
        }
    );

    let output = &reader.outputs()[0];
    assert_eq!(output.text(), "a");
    assert_eq!(output.text_diff(), "a");
    assert_eq!(output.length(), 1);
}

#[test]
fn test_finished_candidate_rejects_appends() {
    let (mut writer, _reader) = RequestOutput::channel("Hello");
    writer.init_candidates(1);
    writer
        .finish_candidate(0, FinishReason::Length, None)
        .expect("known candidate");

    assert!(writer.all_finished());
    let err = writer
        .append(0, delta("late", vec![9], vec![-1.0]))
        .expect_err("candidate finished");
    assert!(matches!(err.kind(), ServeErrorKind::InvalidUpdate(_)));
}

#[test]
fn test_diffs_track_latest_update() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(1);
    writer.set_prompt_token_ids(vec![10, 11]);
    writer
        .append(0, delta("Hi", vec![1, 2], vec![-0.1, -0.2]))
        .expect("valid delta");
    writer
        .append(0, delta(" there", vec![3], vec![-0.3]))
        .expect("valid delta");

    let snapshot = reader.snapshot();
    assert_eq!(snapshot.prompt(), "Hello");
    assert_eq!(snapshot.prompt_token_ids(), &vec![10, 11]);
    assert_eq!(snapshot.state(), &RequestState::Pending);

    let output = &snapshot.outputs()[0];
    assert_eq!(output.text(), "Hi there");
    assert_eq!(output.text_diff(), " there");
    assert_eq!(output.token_ids(), &[1, 2, 3]);
    assert_eq!(output.token_ids_diff(), &[3]);
    assert_eq!(output.logprobs(), &[-0.1, -0.2, -0.3]);
    assert_eq!(output.logprobs_diff(), &[-0.3]);
    assert_eq!(output.length(), 3);
}

#[test]
fn test_init_candidates_keeps_index_order() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(2);
    writer.init_candidates(3);
    writer.init_candidates(1);

    let indices: Vec<usize> = reader.with_outputs(|outputs| outputs.iter().map(|o| o.index()).collect());
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_snapshot_serializes_state() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(1);
    writer.complete();

    let json = serde_json::to_value(reader.snapshot()).expect("serializable snapshot");
    assert_eq!(json["state"], "done");
    assert_eq!(json["outputs"][0]["finish_reason"], "aborted");
}

#[test]
fn test_completing_labels_unfinished_candidates() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(3);
    writer
        .append(0, delta("partial", vec![4], vec![-0.4]))
        .expect("valid delta");
    writer
        .finish_candidate(2, FinishReason::Length, None)
        .expect("known candidate");
    writer.complete();

    assert!(reader.is_done());
    let reasons: Vec<Option<FinishReason>> =
        reader.with_outputs(|outputs| outputs.iter().map(|o| o.finish_reason()).collect());
    assert_eq!(
        reasons,
        vec![
            Some(FinishReason::Aborted),
            Some(FinishReason::Aborted),
            Some(FinishReason::Length),
        ]
    );
    assert_eq!(reader.outputs()[0].text(), "partial");
}
