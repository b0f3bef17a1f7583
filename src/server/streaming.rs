//! Bridges a relay to an HTTP response body.
//!
//! The relay runs in its own task and writes into a [`ChannelSink`]; the
//! receiving half becomes the response body. The status line is withheld
//! until the relay produces its first frame, so a failure before any output
//! (provider error, empty completion) is still answered with a 500 and the
//! error text. After the first frame, a failure terminates the body.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::provider::FragmentStream;
use crate::relay::{sink, Relay, RelayError};

/// Start relaying `fragments` and build the response.
pub async fn relay_response(
    fragments: FragmentStream,
    relay: Relay,
    capacity: usize,
    request_id: Uuid,
) -> Response {
    let (mut sink, mut rx) = sink::channel(capacity);
    let framing = relay.framing();

    tokio::spawn(async move {
        match relay.run(fragments, &mut sink).await {
            Ok(summary) => info!(
                %request_id,
                fragments = summary.fragments,
                bytes = summary.bytes,
                text_len = summary.text_len,
                "Relay complete"
            ),
            Err(RelayError::SinkClosed) => {
                info!(%request_id, "Client went away, relay cancelled")
            }
            Err(e) => {
                warn!(%request_id, error = %e, "Relay aborted");
                sink.fail(e).await;
            }
        }
    });

    match rx.recv().await {
        Some(Ok(first)) => {
            let body = tokio_stream::once(Ok(first)).chain(ReceiverStream::new(rx));
            (
                [
                    (CONTENT_TYPE, framing.content_type()),
                    (CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(body),
            )
                .into_response()
        }
        Some(Err(e)) => AppError::from(e).into_response(),
        // The relay either writes, fails, or reports an empty completion.
        None => AppError::from(RelayError::EmptyResponse).into_response(),
    }
}
