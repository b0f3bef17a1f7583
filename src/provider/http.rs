//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;

use crate::codec::SseDecoder;
use crate::provider::{FragmentStream, ProviderError};

/// Send a request, bounding connection setup and the wait for response
/// headers. The body is streamed afterwards without a deadline.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, ProviderError> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;

    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Both OpenAI and Gemini wrap failures as `{"error": {"message": ...}}`.
async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => format!("{status}"),
        Err(_) => format!("{status}: {}", body.trim()),
    };

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Parses one SSE `data` payload into an optional text fragment.
pub(crate) type EventParser = fn(&str) -> Result<Option<String>, ProviderError>;

/// Turn an event-stream response into a fragment stream.
///
/// The stream ends after the first error it yields.
pub(crate) fn sse_fragments(response: reqwest::Response, parse: EventParser) -> FragmentStream {
    let mut body = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(ProviderError::Http(e));
                    return;
                }
            };

            for event in decoder.push_bytes(&chunk) {
                match parse(&event.data) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        // The last event may lack its blank-line terminator.
        if let Some(event) = decoder.finish() {
            match parse(&event.data) {
                Ok(Some(text)) => yield Ok(text),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        }
    })
}
