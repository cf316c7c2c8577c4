use axum::routing::{delete, get, post};
use axum::Router;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use http::Method;
use tower_http::cors::{Any, CorsLayer};

pub mod avatar;
pub mod client;
pub mod delete;
pub mod directory;
pub mod error;
pub mod file;
pub mod files;
pub mod form;
pub mod upload;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    let cors_layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE])
        .allow_headers(vec![ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    Router::new()
        .route("/upload", post(upload::handler))
        .route("/upload/avatar", post(avatar::handler))
        .route("/delete", delete(delete::handler))
        .route("/directory", post(directory::handler))
        .route("/files", get(files::handler))
        .route("/file", get(file::handler))
        .with_state(state)
        .layer(cors_layer)
}
