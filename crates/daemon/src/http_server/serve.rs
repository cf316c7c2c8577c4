use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::response::{IntoResponse, Response};
use http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, StatusCode};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use common::error::{ErrorKind, StoreError};

use crate::http_server::api::error::{store_error_response, ErrorBody};
use crate::ServiceState;

#[derive(Debug, Default, Deserialize)]
pub struct ServeQuery {
    #[serde(default)]
    pub download: Option<String>,
}

impl ServeQuery {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some("1") | Some("true"))
    }
}

/// Serve a stored file with negotiated content type and disposition.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    query: Option<Query<ServeQuery>>,
    request: Request,
) -> Response {
    let download = query.is_some_and(|Query(q)| q.wants_download());
    let (file_path, negotiated) = match state.store().open_for_serving(&path, download).await {
        Ok(found) => found,
        Err(StoreError::Validation(_)) | Err(StoreError::NotFound(_)) => {
            return ErrorBody::new(ErrorKind::NotFoundError.as_str(), format!("file '{}' not found", path))
                .into_response_with(StatusCode::NOT_FOUND);
        }
        Err(e) => return store_error_response(&e),
    };

    let filename = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response = match ServeFile::new(&file_path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(e) => match e {},
    };
    if !response.status().is_success() {
        return response.into_response();
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&negotiated.content_type) {
        parts.headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&negotiated.content_disposition(&filename)) {
        parts.headers.insert(CONTENT_DISPOSITION, value);
    }
    parts
        .headers
        .insert(CACHE_CONTROL, HeaderValue::from_static(negotiated.cache_control));
    parts
        .headers
        .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    tracing::debug!(
        path = %path,
        disposition = %negotiated.disposition,
        "serving stored file"
    );
    Response::from_parts(parts, body)
}
