//! Streaming relay: forwards a fragment stream to a response sink.
//!
//! Each fragment is framed and written as soon as it arrives. The relay
//! keeps a running copy of the text only to decide, once the source ends,
//! whether the completion was empty. An empty (whitespace-only) completion
//! fails the relay even though its fragments were already written.
//!
//! - [`sink`]: the [`FragmentSink`] abstraction and its channel implementation

pub mod sink;

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

use crate::codec::encode_event;
use crate::provider::{FragmentStream, ProviderError};

pub use sink::{ChannelSink, FragmentSink};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Empty response")]
    EmptyResponse,

    #[error("No fragment received within {0:?}")]
    IdleTimeout(Duration),

    #[error("Response sink closed")]
    SinkClosed,
}

/// Wire framing of a relayed response. One response uses one framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Fragment bytes written verbatim (chunked `text/plain`).
    Raw,
    /// Each fragment wrapped as a server-sent event.
    EventStream,
}

impl Framing {
    pub fn content_type(&self) -> &'static str {
        match self {
            Framing::Raw => "text/plain; charset=utf-8",
            Framing::EventStream => "text/event-stream",
        }
    }

    pub fn frame(&self, fragment: &str) -> Bytes {
        match self {
            Framing::Raw => Bytes::copy_from_slice(fragment.as_bytes()),
            Framing::EventStream => Bytes::from(encode_event(fragment)),
        }
    }
}

/// Counters for a completed relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub fragments: usize,
    /// Bytes written, after framing.
    pub bytes: usize,
    /// Length of the reconstructed text.
    pub text_len: usize,
}

/// Relay settings for one response.
#[derive(Debug, Clone, Copy)]
pub struct Relay {
    framing: Framing,
    idle_timeout: Option<Duration>,
}

impl Relay {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            idle_timeout: None,
        }
    }

    /// Abort when the source goes quiet for longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Pump `fragments` into `sink` until the source completes.
    ///
    /// On success the sink is closed exactly once. On error the sink is left
    /// open; the caller decides how to report the failure.
    pub async fn run<S: FragmentSink>(
        &self,
        mut fragments: FragmentStream,
        sink: &mut S,
    ) -> Result<RelaySummary, RelayError> {
        let mut text = String::new();
        let mut summary = RelaySummary::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return Err(RelayError::SinkClosed),
                next = self.next_fragment(&mut fragments) => next?,
            };
            let Some(fragment) = next else { break };
            let fragment = fragment?;

            let framed = self.framing.frame(&fragment);
            summary.fragments += 1;
            summary.bytes += framed.len();
            sink.write(framed).await?;

            text.push_str(&fragment);
        }

        summary.text_len = text.len();
        if text.trim().is_empty() {
            debug!(fragments = summary.fragments, "Completion was empty");
            return Err(RelayError::EmptyResponse);
        }

        sink.close().await;
        Ok(summary)
    }

    async fn next_fragment(
        &self,
        fragments: &mut FragmentStream,
    ) -> Result<Option<Result<String, ProviderError>>, RelayError> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, fragments.next())
                .await
                .map_err(|_| RelayError::IdleTimeout(limit)),
            None => Ok(fragments.next().await),
        }
    }
}
