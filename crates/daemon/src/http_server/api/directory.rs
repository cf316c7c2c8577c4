use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::error::StoreError;

use super::error::{rejection_response, store_error_response};
use crate::auth::Authenticated;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct CreateDirectoryRequest {
    /// Name of the new directory
    pub name: String,

    /// Existing directory to create it under (defaults to the root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirectoryResponse {
    pub path: String,
}

pub async fn handler(
    _auth: Authenticated,
    State(state): State<ServiceState>,
    request: Result<Json<CreateDirectoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, DirectoryError> {
    let Json(request) = request?;
    let parent = request
        .parent
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty());
    let path = state.store().create_directory(parent, &request.name).await?;

    Ok(Json(CreateDirectoryResponse { path }))
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("invalid request: {0}")]
    Rejected(#[from] JsonRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        match self {
            DirectoryError::Rejected(e) => rejection_response(e.body_text()),
            DirectoryError::Store(e) => store_error_response(&e),
        }
    }
}

impl ApiRequest for CreateDirectoryRequest {
    type Response = CreateDirectoryResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/directory").unwrap();
        client.post(full_url).json(&self)
    }
}
