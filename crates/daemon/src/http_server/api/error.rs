use std::error::Error as StdError;

use axum::extract::multipart::MultipartError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use common::error::{ErrorKind, StoreError};

/// JSON body of every API error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            item_count: None,
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError | ErrorKind::NonEmptyDirectoryError => StatusCode::BAD_REQUEST,
        ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
        ErrorKind::ConflictError => StatusCode::CONFLICT,
        ErrorKind::SizeLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::InternalIoError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a storage error, logging internal failures with their full cause.
pub fn store_error_response(err: &StoreError) -> Response {
    if let StoreError::Interrupted(source) = err {
        if transport_limit_tripped(&**source) {
            return ErrorBody::new(
                ErrorKind::SizeLimitExceeded.as_str(),
                "request body exceeds the upload limit",
            )
            .into_response_with(StatusCode::PAYLOAD_TOO_LARGE);
        }
    }

    let kind = err.kind();
    if kind == ErrorKind::InternalIoError {
        tracing::error!(error = %err, cause = ?err.source(), "storage failure");
    }

    let mut body = ErrorBody::new(kind.as_str(), err.public_message());
    if let StoreError::NonEmptyDirectory { item_count, .. } = err {
        body.item_count = Some(*item_count);
    }
    body.into_response_with(status_for(kind))
}

/// The body was cut off by the server's own size limit rather than the client.
fn transport_limit_tripped(source: &(dyn StdError + Send + Sync + 'static)) -> bool {
    source
        .downcast_ref::<MultipartError>()
        .is_some_and(|e| e.status() == StatusCode::PAYLOAD_TOO_LARGE)
}

/// Error reading a multipart form before anything was staged.
pub fn multipart_error_response(err: MultipartError) -> Response {
    let status = err.status();
    let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::SizeLimitExceeded
    } else {
        ErrorKind::ValidationError
    };
    ErrorBody::new(kind.as_str(), err.body_text()).into_response_with(status_for(kind))
}

/// A query string or JSON body that could not be decoded.
pub fn rejection_response(message: String) -> Response {
    ErrorBody::new(ErrorKind::ValidationError.as_str(), message)
        .into_response_with(StatusCode::BAD_REQUEST)
}
