//! Shared helpers for driving the HTTP router in-process
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Request, Response};
use tempfile::TempDir;
use tower::ServiceExt;

use common::store::{Store, StoreConfig};
use depot_daemon::auth::BearerToken;
use depot_daemon::rate_limit::RateLimiter;
use depot_daemon::service_state::UploadSettings;
use depot_daemon::{http_server, ServiceState};

pub const TOKEN: &str = "test-token";
const BOUNDARY: &str = "depot-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Store,
    _temp_dir: TempDir,
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub max_upload_bytes: u64,
    pub max_avatar_bytes: u64,
    pub avatar_requests: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 1024 * 1024,
            max_avatar_bytes: 64 * 1024,
            avatar_requests: 10,
        }
    }
}

/// Router over a fresh store, guarded by [`TOKEN`]
pub async fn setup_app() -> TestApp {
    setup_app_with(Limits::default()).await
}

pub async fn setup_app_with(limits: Limits) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::new(temp_dir.path().join("storage")))
        .await
        .unwrap();

    let state = ServiceState::new(
        store.clone(),
        Arc::new(BearerToken::new(Some(TOKEN.to_string()))),
        RateLimiter::new(limits.avatar_requests, Duration::from_secs(60)),
        UploadSettings {
            max_upload_bytes: limits.max_upload_bytes,
            max_avatar_bytes: limits.max_avatar_bytes,
            avatar_namespace: "avatars".parse().unwrap(),
            public_url: None,
        },
    );

    TestApp {
        router: http_server::router(state),
        store,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Write `data` straight into the storage root at `relative`
    pub fn put_file(&self, relative: &str, data: &[u8]) {
        let path = self.store.root().path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
}

pub fn bearer() -> String {
    format!("Bearer {}", TOKEN)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header(AUTHORIZATION, bearer())
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, bearer())
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// One multipart field: a text value, or a file with name and MIME type
pub enum Field<'a> {
    Text(&'a str, &'a str),
    File {
        filename: &'a str,
        mime_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_request(uri: &str, fields: &[Field<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match field {
            Field::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Field::File {
                filename,
                mime_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        filename, mime_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(AUTHORIZATION, bearer())
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
