use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use common::version::build_info;

pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, Json(build_info()))
}
