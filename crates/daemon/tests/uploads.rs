//! Integration tests for the multipart upload and avatar routes

mod common;

use http::header::AUTHORIZATION;
use http::StatusCode;

use crate::common::{
    json_body, multipart_request, setup_app, setup_app_with, Field, Limits, TestApp,
};

fn staging_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(app.store.root().staging_dir())
        .unwrap()
        .next()
        .is_none()
}

#[tokio::test]
async fn test_upload_routes_by_category() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload",
            &[Field::File {
                filename: "photo.png",
                mime_type: "image/png",
                data: b"png-bytes",
            }],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filename"], "photo.png");
    assert_eq!(body["category"], "images");
    assert_eq!(body["url"], "/images/photo.png");
    assert_eq!(body["size"], 9);
    assert_eq!(
        std::fs::read(app.store.root().path().join("images/photo.png")).unwrap(),
        b"png-bytes"
    );
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_upload_fields_after_file_still_apply() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload",
            &[
                Field::File {
                    filename: "contract.pdf",
                    mime_type: "application/pdf",
                    data: b"%PDF",
                },
                Field::Text("namespace", "clients"),
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["namespace"], "clients");
    assert_eq!(body["category"], "documents");
    assert_eq!(body["url"], "/clients/contract.pdf");
}

#[tokio::test]
async fn test_upload_same_name_twice_gets_new_name() {
    let app = setup_app().await;
    let upload = || {
        multipart_request(
            "/upload",
            &[Field::File {
                filename: "song.mp3",
                mime_type: "audio/mpeg",
                data: b"id3",
            }],
        )
    };

    let first = json_body(app.send(upload()).await).await;
    let second = json_body(app.send(upload()).await).await;
    assert_eq!(first["filename"], "song.mp3");
    assert_ne!(second["filename"], "song.mp3");
    let second_name = second["filename"].as_str().unwrap();
    assert!(second_name.starts_with("song-") && second_name.ends_with(".mp3"));
}

#[tokio::test]
async fn test_upload_rejects_bad_category_and_missing_file() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload",
            &[
                Field::Text("category", "spreadsheets"),
                Field::File {
                    filename: "a.txt",
                    mime_type: "text/plain",
                    data: b"a",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ValidationError");
    assert!(staging_is_empty(&app));

    let response = app
        .send(multipart_request(
            "/upload",
            &[Field::Text("category", "images")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_over_limit() {
    let app = setup_app_with(Limits {
        max_upload_bytes: 16,
        ..Limits::default()
    })
    .await;

    let response = app
        .send(multipart_request(
            "/upload",
            &[Field::File {
                filename: "big.bin",
                mime_type: "application/octet-stream",
                data: &[0u8; 64],
            }],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["error"], "SizeLimitExceeded");
    assert!(staging_is_empty(&app));
    assert!(!app.store.root().path().join("others/big.bin").exists());
}

#[tokio::test]
async fn test_upload_requires_token() {
    let app = setup_app().await;
    let mut request = multipart_request(
        "/upload",
        &[Field::File {
            filename: "a.png",
            mime_type: "image/png",
            data: b"a",
        }],
    );
    request.headers_mut().remove(AUTHORIZATION);

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_avatar_with_custom_name() {
    let app = setup_app().await;
    let mut request = multipart_request(
        "/upload/avatar",
        &[
            Field::Text("name", "alice"),
            Field::File {
                filename: "IMG_0001.png",
                mime_type: "image/png",
                data: b"avatar",
            },
        ],
    );
    // The avatar route is public
    request.headers_mut().remove(AUTHORIZATION);

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filename"], "alice.png");
    assert_eq!(body["url"], "/avatars/alice.png");
    assert!(app.store.root().path().join("avatars/alice.png").exists());
}

#[tokio::test]
async fn test_avatar_rejects_non_images() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload/avatar",
            &[Field::File {
                filename: "notes.txt",
                mime_type: "text/plain",
                data: b"hello",
            }],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ValidationError");
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_avatar_custom_name_cannot_change_type() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload/avatar",
            &[
                Field::Text("name", "page.html"),
                Field::File {
                    filename: "me.png",
                    mime_type: "image/png",
                    data: b"avatar",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filename"], "page.png");
    assert_eq!(body["url"], "/avatars/page.png");
    assert!(!app.store.root().path().join("avatars/page.html").exists());
}

#[tokio::test]
async fn test_avatar_rejects_non_image_extension_with_image_mime() {
    let app = setup_app().await;

    let response = app
        .send(multipart_request(
            "/upload/avatar",
            &[Field::File {
                filename: "tool.exe",
                mime_type: "image/png",
                data: b"MZ",
            }],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ValidationError");
    assert!(!app.store.root().path().join("avatars/tool.exe").exists());
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_avatar_size_limit() {
    let app = setup_app_with(Limits {
        max_avatar_bytes: 8,
        ..Limits::default()
    })
    .await;

    let response = app
        .send(multipart_request(
            "/upload/avatar",
            &[Field::File {
                filename: "huge.png",
                mime_type: "image/png",
                data: &[1u8; 32],
            }],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_avatar_rate_limited_per_client() {
    let app = setup_app_with(Limits {
        avatar_requests: 2,
        ..Limits::default()
    })
    .await;
    let avatar = |client: &'static str| {
        let mut request = multipart_request(
            "/upload/avatar",
            &[Field::File {
                filename: "me.png",
                mime_type: "image/png",
                data: b"png",
            }],
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    assert_eq!(app.send(avatar("203.0.113.1")).await.status(), StatusCode::OK);
    assert_eq!(app.send(avatar("203.0.113.1")).await.status(), StatusCode::OK);

    let response = app.send(avatar("203.0.113.1")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["error"], "RateLimited");

    assert_eq!(app.send(avatar("203.0.113.2")).await.status(), StatusCode::OK);
}
