//! Client side of the relay.
//!
//! - [`view`]: chat view state machine with a single in-progress slot
//! - [`consumer`]: incremental body reader that drives the view
//! - [`http`]: endpoint-aware HTTP client used by the `chat` binary

pub mod consumer;
pub mod http;
pub mod view;

pub use consumer::{BodyDecoder, ConsumeOutcome, StreamConsumer};
pub use http::{ChatClient, ClientError, Endpoint};
pub use view::{ChatView, ViewError, ViewState};
