//! Response sinks for the relay.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::relay::RelayError;

/// Destination that accepts incremental writes followed by one close.
#[async_trait]
pub trait FragmentSink: Send + Sync {
    /// Write one framed fragment. Fails once the sink is closed or the
    /// reader has gone away.
    async fn write(&mut self, chunk: Bytes) -> Result<(), RelayError>;

    /// End the response. Later writes fail with [`RelayError::SinkClosed`].
    async fn close(&mut self);

    /// Resolves when the reader has gone away. Sinks that cannot observe
    /// their reader never resolve.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Items carried from the relay task to the response body.
pub type BodyFrame = Result<Bytes, RelayError>;

/// Sink backed by a bounded channel; the receiving half feeds an HTTP body.
///
/// Dropping the receiver (client disconnect) makes [`closed`] resolve and
/// every later write fail, which stops the relay.
///
/// [`closed`]: FragmentSink::closed
pub struct ChannelSink {
    tx: Option<mpsc::Sender<BodyFrame>>,
}

/// Create a sink and the receiver for its frames.
pub fn channel(capacity: usize) -> (ChannelSink, mpsc::Receiver<BodyFrame>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx: Some(tx) }, rx)
}

impl ChannelSink {
    /// Hand a relay failure to the reader and close the sink.
    pub async fn fail(&mut self, error: RelayError) {
        if let Some(tx) = self.tx.take() {
            if let Err(undelivered) = tx.send(Err(error)).await {
                debug!(error = ?undelivered.0, "Reader gone, relay error not delivered");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl FragmentSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), RelayError> {
        let tx = self.tx.as_ref().ok_or(RelayError::SinkClosed)?;
        tx.send(Ok(chunk)).await.map_err(|_| RelayError::SinkClosed)
    }

    async fn close(&mut self) {
        self.tx = None;
    }

    async fn closed(&self) {
        match &self.tx {
            Some(tx) => tx.closed().await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_close() {
        let (mut sink, mut rx) = channel(4);
        sink.write(Bytes::from_static(b"a")).await.unwrap();
        sink.close().await;

        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"a"));
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            sink.write(Bytes::from_static(b"b")).await,
            Err(RelayError::SinkClosed)
        ));
    }

    #[tokio::test]
    async fn test_dropped_reader_closes_sink() {
        let (mut sink, rx) = channel(4);
        drop(rx);
        sink.closed().await;
        assert!(sink.is_closed());
        assert!(sink.write(Bytes::from_static(b"a")).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_delivers_error() {
        let (mut sink, mut rx) = channel(4);
        sink.fail(RelayError::EmptyResponse).await;
        assert!(matches!(rx.recv().await, Some(Err(RelayError::EmptyResponse))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_after_reader_dropped() {
        let (mut sink, rx) = channel(4);
        drop(rx);
        sink.fail(RelayError::EmptyResponse).await;
        assert!(sink.is_closed());
        assert!(matches!(
            sink.write(Bytes::from_static(b"a")).await,
            Err(RelayError::SinkClosed)
        ));
    }
}
