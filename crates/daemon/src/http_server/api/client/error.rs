use reqwest::StatusCode;

use crate::http_server::api::error::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("{} ({}): {}", .body.error, .status, .body.message)]
    Service { status: StatusCode, body: ErrorBody },
}

impl ApiError {
    /// Error kind reported by the service, if the response carried one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ApiError::Service { body, .. } => Some(&body.error),
            _ => None,
        }
    }
}
