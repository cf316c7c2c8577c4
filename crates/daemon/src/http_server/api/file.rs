use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::directory::StoredFile;
use common::error::StoreError;

use super::error::{rejection_response, store_error_response};
use crate::auth::Authenticated;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct FileInfoRequest {
    /// Directory holding the file
    #[arg(long)]
    pub dir: String,
    /// File name
    #[arg(long)]
    pub name: String,
}

pub async fn handler(
    _auth: Authenticated,
    State(state): State<ServiceState>,
    request: Result<Query<FileInfoRequest>, QueryRejection>,
) -> Result<impl IntoResponse, FileInfoError> {
    let Query(request) = request?;
    let stored = state.store().stat_file(&request.dir, &request.name).await?;
    Ok(Json(stored))
}

#[derive(Debug, thiserror::Error)]
pub enum FileInfoError {
    #[error("invalid request: {0}")]
    Rejected(#[from] QueryRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for FileInfoError {
    fn into_response(self) -> Response {
        match self {
            FileInfoError::Rejected(e) => rejection_response(e.body_text()),
            FileInfoError::Store(e) => store_error_response(&e),
        }
    }
}

impl ApiRequest for FileInfoRequest {
    type Response = StoredFile;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/file").unwrap();
        client.get(full_url).query(&self)
    }
}
