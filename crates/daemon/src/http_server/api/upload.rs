use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::multipart::{Form, Part};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::category::Category;
use common::error::{ErrorKind, StoreError};
use common::layout::Namespace;

use super::error::{store_error_response, ErrorBody};
use super::form::{read_upload_form, FormError, UploadForm, FILE_FIELD};
use crate::auth::Authenticated;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// A file to upload, as sent by the CLI client.
#[derive(Debug, Clone)]
pub struct UploadFileRequest {
    pub filename: String,
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
    pub category: Option<Category>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub category: Category,
    pub namespace: Option<String>,
    pub size: u64,
}

pub async fn handler(
    _auth: Authenticated,
    State(state): State<ServiceState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, UploadError> {
    let limit = state.uploads().max_upload_bytes;
    let form = read_upload_form(state.store(), &mut multipart, limit, |_, _| true).await?;

    let (category, namespace) = match routing(&form) {
        Ok(routing) => routing,
        Err(e) => {
            form.discard().await;
            return Err(e.into());
        }
    };
    let Some(file) = form.file else {
        return Err(UploadError::NoFile);
    };

    let stored = state
        .store()
        .commit(file, category, namespace.as_ref())
        .await?;

    Ok(Json(UploadResponse {
        url: state.uploads().url_for(&stored.relative_path()),
        filename: stored.filename,
        category: stored.category,
        namespace: stored.namespace,
        size: stored.size,
    }))
}

fn routing(form: &UploadForm) -> Result<(Option<Category>, Option<Namespace>), StoreError> {
    let category = form
        .field("category")
        .map(str::parse::<Category>)
        .transpose()?;
    let namespace = form
        .field("namespace")
        .map(str::parse::<Namespace>)
        .transpose()?;
    Ok((category, namespace))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no file provided")]
    NoFile,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::NoFile => {
                ErrorBody::new(ErrorKind::ValidationError.as_str(), self.to_string())
                    .into_response_with(http::StatusCode::BAD_REQUEST)
            }
            UploadError::Form(e) => e.into_response(),
            UploadError::Store(e) => store_error_response(&e),
        }
    }
}

impl ApiRequest for UploadFileRequest {
    type Response = UploadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/upload").unwrap();
        let mut form = Form::new().part(
            FILE_FIELD,
            file_part(self.data, self.filename, self.mime_type.as_deref()),
        );
        if let Some(category) = self.category {
            form = form.text("category", category.to_string());
        }
        if let Some(namespace) = self.namespace {
            form = form.text("namespace", namespace);
        }
        client.post(full_url).multipart(form)
    }
}

/// Multipart file part; an unparsable MIME type is left out.
pub(crate) fn file_part(data: Vec<u8>, filename: String, mime_type: Option<&str>) -> Part {
    let mut headers = HeaderMap::new();
    if let Some(value) = mime_type.and_then(|m| HeaderValue::from_str(m).ok()) {
        headers.insert(CONTENT_TYPE, value);
    }
    Part::bytes(data).file_name(filename).headers(headers)
}
