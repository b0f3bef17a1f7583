//! Incremental reader for relayed response bodies.
//!
//! Bytes are decoded statefully, so characters split across reads come out
//! intact. After every read that produced text, the cumulative reply
//! replaces the view's in-progress slot.

use std::fmt::Display;
use std::future::Future;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::client::view::ChatView;
use crate::codec::{SseDecoder, Utf8Decoder};
use crate::relay::Framing;

/// Turns body bytes into reply text for one framing.
#[derive(Debug)]
pub enum BodyDecoder {
    Raw(Utf8Decoder),
    EventStream(SseDecoder),
}

impl BodyDecoder {
    pub fn new(framing: Framing) -> Self {
        match framing {
            Framing::Raw => BodyDecoder::Raw(Utf8Decoder::new()),
            Framing::EventStream => BodyDecoder::EventStream(SseDecoder::new()),
        }
    }

    /// Text completed by `bytes`.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        match self {
            BodyDecoder::Raw(utf8) => utf8.decode(bytes),
            BodyDecoder::EventStream(sse) => sse.push_bytes(bytes).into_iter().map(|e| e.data).collect(),
        }
    }

    /// Flush whatever is buffered at end of stream.
    pub fn finish(&mut self) -> String {
        match self {
            BodyDecoder::Raw(utf8) => utf8.finish(),
            BodyDecoder::EventStream(sse) => sse.finish().map(|e| e.data).unwrap_or_default(),
        }
    }
}

/// How a consumed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

pub struct StreamConsumer {
    framing: Framing,
}

impl StreamConsumer {
    pub fn new(framing: Framing) -> Self {
        Self { framing }
    }

    /// Read `body` to the end, updating `view` as text arrives.
    ///
    /// `view` must be streaming (see [`ChatView::begin_turn`]). When `cancel`
    /// resolves, reading stops at once and the view moves to `Cancelled`;
    /// nothing received afterwards is rendered. `on_update` runs after every
    /// change to the view.
    pub async fn consume<S, E, C, F>(
        &self,
        body: S,
        cancel: C,
        view: &mut ChatView,
        mut on_update: F,
    ) -> ConsumeOutcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        C: Future<Output = ()>,
        F: FnMut(&ChatView),
    {
        futures::pin_mut!(body);
        futures::pin_mut!(cancel);

        let mut decoder = BodyDecoder::new(self.framing);
        let mut text = String::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = &mut cancel => {
                    view.cancel();
                    on_update(view);
                    return ConsumeOutcome::Cancelled;
                }
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    let fresh = decoder.push(&bytes);
                    if !fresh.is_empty() {
                        text.push_str(&fresh);
                        view.update(&text);
                        on_update(view);
                    }
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    view.fail(message.clone());
                    on_update(view);
                    return ConsumeOutcome::Failed(message);
                }
                None => break,
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            text.push_str(&tail);
            view.update(&text);
        }
        view.finish();
        on_update(view);
        ConsumeOutcome::Completed
    }
}
