use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::directory::Entry;
use common::error::StoreError;

use super::error::{rejection_response, store_error_response};
use crate::auth::Authenticated;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct ListFilesRequest {
    /// Directory to list (defaults to the root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub dir: Option<String>,
}

pub async fn handler(
    _auth: Authenticated,
    State(state): State<ServiceState>,
    request: Result<Query<ListFilesRequest>, QueryRejection>,
) -> Result<impl IntoResponse, ListFilesError> {
    let Query(request) = request?;
    let entries = state.store().list_entries(request.dir.as_deref()).await?;
    Ok(Json(entries))
}

#[derive(Debug, thiserror::Error)]
pub enum ListFilesError {
    #[error("invalid request: {0}")]
    Rejected(#[from] QueryRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ListFilesError {
    fn into_response(self) -> Response {
        match self {
            ListFilesError::Rejected(e) => rejection_response(e.body_text()),
            ListFilesError::Store(e) => store_error_response(&e),
        }
    }
}

impl ApiRequest for ListFilesRequest {
    type Response = Vec<Entry>;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/files").unwrap();
        client.get(full_url).query(&self)
    }
}
