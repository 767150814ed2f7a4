//! JSON response writing.
//!
//! Every handler outcome except the completion page leaves through
//! [`write_json`], including every [`AppError`].

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
}

impl From<AppError> for ErrorBody {
    fn from(err: AppError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
        }
    }
}

/// Serialize `payload` as a JSON response with the given status.
///
/// Status and content type are fixed before the body is attached.
///
/// # Panics
///
/// Panics if `payload` cannot be serialized. Response payloads are built from
/// internal types, so a failure here is a bug rather than a request error.
pub fn write_json<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    let body = match serde_json::to_vec(payload) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response payload");
            panic!("response payload failed to serialize: {e}");
        }
    };

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        write_json(self.status(), &ErrorBody::from(self))
    }
}
