// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire-level error envelope for the data-hub API.
//!
//! Store and verifier errors carry an [`hub_error::ErrorKind`]; the facade
//! maps the kind to its HTTP status and renders a small JSON body. Internal
//! errors are logged and surfaced without detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hub_error::{ErrorKind, HubError};
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error payload.
    pub error: ErrorDetail,
}

/// Kind and message of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable wire name of the error kind.
    pub kind: ErrorKind,
    /// Human-readable message. Generic for internal errors.
    pub message: String,
}

/// Facade-level error: a [`HubError`] with an HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Unclassified failures are logged with their detail and surfaced
        // opaque.
        let message = if err.kind == ErrorKind::InternalError {
            error!(error = %err, "internal error");
            "internal error".to_owned()
        } else {
            err.message.clone()
        };

        let body = Json(ErrorBody {
            error: ErrorDetail {
                kind: err.kind,
                message,
            },
        });
        (status, body).into_response()
    }
}

/// Handler result alias.
pub type ApiResult<T> = Result<T, ApiError>;
