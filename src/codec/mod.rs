//! Incremental decoders shared by the provider adapters and the client.
//!
//! - [`utf8`]: stateful UTF-8 decoding of byte chunks that may split characters
//! - [`sse`]: server-sent-events framing (encode and incremental decode)

pub mod sse;
pub mod utf8;

pub use sse::{encode_event, SseDecoder, SseEvent};
pub use utf8::Utf8Decoder;
