//! Request-level errors and their HTTP mapping.
//!
//! Every failure a handler can produce is an [`AppError`]; its
//! `IntoResponse` impl picks the status and writes the message as a
//! `text/plain` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::provider::ProviderError;
use crate::relay::RelayError;

#[derive(Error, Debug)]
pub enum AppError {
    /// A required field is missing or names something unknown.
    #[error("{0}")]
    Validation(String),

    /// Unknown session id.
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn missing_field(field: &str) -> Self {
        AppError::Validation(format!("Missing {field} parameter in the body."))
    }

    pub fn session_not_found(id: &str) -> Self {
        AppError::NotFound(format!("Chat {id} not found."))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider(_) | AppError::Relay(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}
