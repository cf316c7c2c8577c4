use std::net::SocketAddr;
use std::path::Path;

use axum::extract::{ConnectInfo, Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use common::category::{Category, CategoryTable};
use common::encoding;
use common::error::{ErrorKind, StoreError};
use common::layout::sanitize_filename;

use super::error::{store_error_response, ErrorBody};
use super::form::{read_upload_form, FormError};
use crate::ServiceState;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
}

pub async fn handler(
    State(state): State<ServiceState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AvatarError> {
    let client = client_id(connect_info.as_ref().map(|c| c.0), &headers);
    if !state.avatar_limiter().is_allowed(&client) {
        tracing::warn!(client = %client, "avatar upload rate limited");
        return Err(AvatarError::RateLimited);
    }

    let categories = state.store().categories();
    let limit = state.uploads().max_avatar_bytes;
    let form = read_upload_form(state.store(), &mut multipart, limit, |filename, mime| {
        categories.classify(mime, filename) == Category::Images
    })
    .await?;

    let custom_name = form.field("name").map(str::to_string);
    let Some(mut file) = form.file else {
        return Err(AvatarError::NoFile);
    };
    let Some(filename) = avatar_filename(categories, file.filename(), custom_name.as_deref())
    else {
        let rejected = file.filename().to_string();
        file.discard().await;
        return Err(FormError::Rejected(rejected).into());
    };
    file.rename(&filename);

    let stored = state
        .store()
        .commit(file, None, Some(&state.uploads().avatar_namespace))
        .await?;

    Ok(Json(AvatarResponse {
        url: state.uploads().url_for(&stored.relative_path()),
        filename: stored.filename,
        size: stored.size,
    }))
}

/// Rate-limit key: the peer address, else the first forwarded-for hop.
fn client_id(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Final avatar filename, or `None` when the upload's own extension is not an
/// image type.
///
/// A custom `name` keeps its extension only if that is an image extension;
/// otherwise its stem gets the upload's extension.
fn avatar_filename(
    categories: &CategoryTable,
    uploaded: &str,
    custom: Option<&str>,
) -> Option<String> {
    let is_image = |name: &str| categories.classify(None, name) == Category::Images;
    if !is_image(uploaded) {
        return None;
    }
    let Some(custom) = custom else {
        return Some(uploaded.to_string());
    };
    let custom = sanitize_filename(&encoding::fix(custom));
    if is_image(&custom) {
        return Some(custom);
    }
    let stem = Path::new(&custom)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(custom);
    let ext = Path::new(uploaded).extension()?.to_string_lossy().into_owned();
    Some(format!("{}.{}", stem, ext))
}

#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error("too many avatar uploads, try again later")]
    RateLimited,
    #[error("no file provided")]
    NoFile,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AvatarError {
    fn into_response(self) -> Response {
        match self {
            AvatarError::RateLimited => ErrorBody::new("RateLimited", self.to_string())
                .into_response_with(StatusCode::TOO_MANY_REQUESTS),
            AvatarError::NoFile => {
                ErrorBody::new(ErrorKind::ValidationError.as_str(), self.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            AvatarError::Form(e) => e.into_response(),
            AvatarError::Store(e) => store_error_response(&e),
        }
    }
}
