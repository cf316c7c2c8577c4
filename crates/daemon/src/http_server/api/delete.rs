use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::directory::EntryKind;
use common::error::StoreError;

use super::error::{rejection_response, store_error_response};
use crate::auth::Authenticated;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct DeleteRequest {
    /// Root-relative path of the file or empty directory to delete
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub path: String,
    pub kind: EntryKind,
}

pub async fn handler(
    _auth: Authenticated,
    State(state): State<ServiceState>,
    request: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, DeleteError> {
    let Json(request) = request?;
    let kind = state.store().delete_entry(&request.path).await?;

    Ok(Json(DeleteResponse {
        path: request.path.trim_matches('/').to_string(),
        kind,
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("invalid request: {0}")]
    Rejected(#[from] JsonRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for DeleteError {
    fn into_response(self) -> Response {
        match self {
            DeleteError::Rejected(e) => rejection_response(e.body_text()),
            DeleteError::Store(e) => store_error_response(&e),
        }
    }
}

impl ApiRequest for DeleteRequest {
    type Response = DeleteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/delete").unwrap();
        client.delete(full_url).json(&self)
    }
}
