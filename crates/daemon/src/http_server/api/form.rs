use std::collections::HashMap;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use common::error::{ErrorKind, StoreError};
use common::store::{PendingUpload, Store};

use super::error::{multipart_error_response, store_error_response, ErrorBody};

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// A parsed upload form: the staged file plus its text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<PendingUpload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// A text field, trimmed; empty values count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub async fn discard(self) {
        if let Some(file) = self.file {
            file.discard().await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("malformed form: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("file type not accepted: {0}")]
    Rejected(String),
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        match self {
            FormError::Multipart(e) => multipart_error_response(e),
            FormError::Store(e) => store_error_response(&e),
            FormError::Rejected(_) => {
                ErrorBody::new(ErrorKind::ValidationError.as_str(), self.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
        }
    }
}

/// Read every field of `multipart`, streaming the first `file` field into
/// the staging tree.
///
/// `accept` sees the declared filename and MIME type before any bytes are
/// written. On error nothing is left staged.
pub async fn read_upload_form<F>(
    store: &Store,
    multipart: &mut Multipart,
    limit: u64,
    accept: F,
) -> Result<UploadForm, FormError>
where
    F: Fn(&str, Option<&str>) -> bool,
{
    let mut form = UploadForm::default();
    match read_fields(store, multipart, limit, accept, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            form.discard().await;
            Err(e)
        }
    }
}

async fn read_fields<F>(
    store: &Store,
    multipart: &mut Multipart,
    limit: u64,
    accept: F,
    form: &mut UploadForm,
) -> Result<(), FormError>
where
    F: Fn(&str, Option<&str>) -> bool,
{
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name != FILE_FIELD {
            let value = field.text().await?;
            form.fields.entry(name).or_insert(value);
            continue;
        }
        if form.file.is_some() {
            tracing::debug!("ignoring additional file field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().map(str::to_string);
        if !accept(&filename, mime_type.as_deref()) {
            return Err(FormError::Rejected(
                mime_type.unwrap_or_else(|| filename.clone()),
            ));
        }
        form.file = Some(store.stage(&filename, mime_type, field, Some(limit)).await?);
    }
    Ok(())
}
