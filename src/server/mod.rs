//! HTTP server.
//!
//! - [`api`]: Request/response types, application state and route handlers
//! - [`streaming`]: Bridges the relay to chunked / SSE response bodies

pub mod api;
pub mod streaming;
