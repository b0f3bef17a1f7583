//! Integration tests for the streaming relay.

mod common;

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;

use chat_relay::codec::SseDecoder;
use chat_relay::provider::{FragmentStream, ProviderError};
use chat_relay::relay::{sink, Framing, Relay, RelayError};

use common::VecSink;

fn fragments(parts: &[&str]) -> FragmentStream {
    let items: Vec<Result<String, ProviderError>> = parts.iter().map(|p| Ok(p.to_string())).collect();
    Box::pin(futures::stream::iter(items))
}

#[tokio::test]
async fn test_raw_relay_preserves_order() {
    let parts = ["The ", "quick ", "br", "own", " fox", "\n", "Жёлтый 🦊"];
    let mut sink = VecSink::default();

    let summary = Relay::new(Framing::Raw)
        .run(fragments(&parts), &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.text(), parts.concat());
    assert_eq!(sink.chunks.len(), parts.len());
    assert_eq!(sink.close_count, 1);
    assert_eq!(summary.fragments, parts.len());
    assert_eq!(summary.bytes, parts.concat().len());
}

#[tokio::test]
async fn test_event_stream_relay_round_trips_through_decoder() {
    let parts = ["He", "llo", "\n\nsecond paragraph", " done"];
    let mut sink = VecSink::default();

    Relay::new(Framing::EventStream)
        .run(fragments(&parts), &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.chunks[0], Bytes::from_static(b"data: He\n\n"));

    let mut decoder = SseDecoder::new();
    let decoded: Vec<String> = decoder
        .push_str(&sink.text())
        .into_iter()
        .map(|e| e.data)
        .collect();
    assert_eq!(decoded, parts);
}

#[tokio::test]
async fn test_event_stream_normalises_line_endings() {
    let mut sink = VecSink::default();

    Relay::new(Framing::EventStream)
        .run(fragments(&["a\r\nb", "c\rd"]), &mut sink)
        .await
        .unwrap();

    let decoded: Vec<String> = SseDecoder::new()
        .push_str(&sink.text())
        .into_iter()
        .map(|e| e.data)
        .collect();
    assert_eq!(decoded, ["a\nb", "c\nd"]);
}

#[tokio::test]
async fn test_whitespace_only_completion_fails_after_flush() {
    let mut sink = VecSink::default();

    let err = Relay::new(Framing::Raw)
        .run(fragments(&[" ", "\n", "\t "]), &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::EmptyResponse));
    // Fragments were already written; the sink is left for the caller.
    assert_eq!(sink.chunks.len(), 3);
    assert_eq!(sink.close_count, 0);
}

#[tokio::test]
async fn test_no_fragments_is_empty_response() {
    let mut sink = VecSink::default();
    let err = Relay::new(Framing::EventStream)
        .run(fragments(&[]), &mut sink)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Empty response");
    assert!(sink.chunks.is_empty());
}

#[tokio::test]
async fn test_source_error_aborts_relay() {
    let items: Vec<Result<String, ProviderError>> = vec![
        Ok("Par".to_string()),
        Err(ProviderError::Api {
            status: 500,
            message: "upstream reset".to_string(),
        }),
        Ok("tial".to_string()),
    ];
    let mut sink = VecSink::default();

    let err = Relay::new(Framing::Raw)
        .run(Box::pin(futures::stream::iter(items)), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "upstream reset");
    assert_eq!(sink.text(), "Par");
    assert_eq!(sink.close_count, 0);
}

#[tokio::test]
async fn test_idle_timeout() {
    let stream: FragmentStream = Box::pin(
        futures::stream::iter(vec![Ok("first".to_string())]).chain(futures::stream::pending()),
    );
    let mut sink = VecSink::default();

    let err = Relay::new(Framing::Raw)
        .with_idle_timeout(Some(Duration::from_millis(50)))
        .run(stream, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::IdleTimeout(_)));
    assert_eq!(sink.text(), "first");
}

#[tokio::test]
async fn test_dropped_reader_stops_relay_without_further_writes() {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, ProviderError>>(4);
    let source: FragmentStream = Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));

    let (mut sink, mut body) = sink::channel(4);
    let relay = tokio::spawn(async move { Relay::new(Framing::Raw).run(source, &mut sink).await });

    tx.send(Ok("Par".to_string())).await.unwrap();
    assert_eq!(body.recv().await.unwrap().unwrap(), Bytes::from_static(b"Par"));

    // Client disconnects while the provider is still producing.
    drop(body);

    let result = relay.await.unwrap();
    assert!(matches!(result, Err(RelayError::SinkClosed)));
    // The relay dropped the source, so the provider side sees the hang-up.
    assert!(tx.send(Ok("tial".to_string())).await.is_err());
}
