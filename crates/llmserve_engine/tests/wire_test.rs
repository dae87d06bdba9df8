use llmserve_core::{FinishReason, RequestOutput, StopReason};
use llmserve_engine::{EngineEvent, LineBuffer};
use llmserve_error::ServeErrorKind;

#[test]
fn test_line_buffer_joins_split_chunks() {
    let mut buffer = LineBuffer::default();

    assert!(buffer.push(b"{\"type\":\"pro").expect("utf-8").is_empty());
    let lines = buffer
        .push(b"mpt\",\"token_ids\":[1]}\n\n{\"type\":")
        .expect("utf-8");
    assert_eq!(lines, vec![r#"{"type":"prompt","token_ids":[1]}"#.to_string()]);

    let lines = buffer
        .push(b"\"error\",\"message\":\"x\"}\r\n")
        .expect("utf-8");
    assert_eq!(lines.len(), 1);
    assert_eq!(buffer.finish().expect("utf-8"), None);
}

#[test]
fn test_line_buffer_returns_unterminated_tail() {
    let mut buffer = LineBuffer::default();
    buffer.push(b"{\"type\":\"prompt\",\"token_ids\":[]}").expect("utf-8");

    assert_eq!(
        buffer.finish().expect("utf-8"),
        Some(r#"{"type":"prompt","token_ids":[]}"#.to_string())
    );
}

#[test]
fn test_line_buffer_rejects_unterminated_oversized_lines() {
    let mut buffer = LineBuffer::with_max_line_bytes(16);

    let lines = buffer.push(b"{\"type\":\"x\"}\n0123456789").expect("within limit");
    assert_eq!(lines.len(), 1);

    let err = buffer.push(b"abcdefghij").expect_err("20 bytes without a newline");
    assert!(matches!(err.kind(), ServeErrorKind::Engine(_)));
    assert_eq!(buffer.finish().expect("utf-8"), None);
}

#[test]
fn test_line_buffer_default_limit_allows_large_lines() {
    let mut buffer = LineBuffer::default();
    let long_line = vec![b'a'; 64 * 1024];

    assert!(buffer.push(&long_line).expect("under default limit").is_empty());
    assert_eq!(
        buffer.finish().expect("utf-8").map(|line| line.len()),
        Some(64 * 1024)
    );

    let oversized = vec![b'a'; LineBuffer::DEFAULT_MAX_LINE_BYTES + 1];
    assert!(buffer.push(&oversized).is_err());
}

#[test]
fn test_events_drive_the_writer() {
    let (mut writer, reader) = RequestOutput::channel("Hello");
    writer.init_candidates(1);

    let events = [
        r#"{"type":"prompt","token_ids":[15496]}"#,
        r#"{"type":"delta","index":0,"text":" world","token_ids":[995],"logprobs":[-0.7]}"#,
        r#"{"type":"finish","index":0,"finish_reason":"stop","stop_reason":"!"}"#,
    ];
    for line in events {
        EngineEvent::parse(line)
            .expect("well-formed event")
            .apply(&mut writer)
            .expect("applicable event");
    }

    assert_eq!(reader.prompt_token_ids(), vec![15496]);
    let outputs = reader.outputs();
    let output = &outputs[0];
    assert_eq!(output.text(), " world");
    assert_eq!(output.logprobs(), &[-0.7f32]);
    assert_eq!(output.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(output.stop_reason(), Some(&StopReason::Text("!".to_string())));
}

#[test]
fn test_error_and_malformed_events_fail() {
    let (mut writer, _reader) = RequestOutput::channel("Hello");

    let err = EngineEvent::parse(r#"{"type":"error","message":"out of memory"}"#)
        .expect("well-formed event")
        .apply(&mut writer)
        .expect_err("error events abort");
    assert_eq!(err.kind(), &ServeErrorKind::Engine("out of memory".to_string()));

    let err = EngineEvent::parse(r#"{"type":"delta"}"#).expect_err("missing index");
    assert!(matches!(err.kind(), ServeErrorKind::Engine(_)));
}
