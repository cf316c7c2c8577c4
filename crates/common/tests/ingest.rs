//! Integration tests for the upload pipeline: stage, route, commit

mod common;

use std::collections::HashSet;
use std::io;

use ::common::category::Category;
use ::common::error::{ErrorKind, StoreError};
use ::common::finalize::CommitMode;
use ::common::layout::Namespace;
use ::common::store::UploadRequest;
use bytes::Bytes;

#[tokio::test]
async fn test_ingest_round_trip() {
    let (store, _temp) = common::setup_test_env().await;

    let stored = store
        .ingest(
            common::request("notes.txt", Some("text/plain")),
            common::body(b"some plain text that spans a few chunks"),
        )
        .await
        .unwrap();

    assert_eq!(stored.category, Category::Documents);
    assert_eq!(stored.relative_path(), "documents/notes.txt");
    assert_eq!(stored.size, 39);
    assert_eq!(stored.namespace, None);

    let on_disk = std::fs::read(store.root().path().join("documents/notes.txt")).unwrap();
    assert_eq!(on_disk, b"some plain text that spans a few chunks");
    assert_eq!(common::staging_len(&store), 0);
}

#[tokio::test]
async fn test_mis_decoded_name_is_repaired_and_classified() {
    let (store, _temp) = common::setup_test_env().await;

    let stored = store
        .ingest(
            common::request(&common::mangle("报告.pdf"), Some("application/pdf")),
            common::body(b"%PDF-1.7"),
        )
        .await
        .unwrap();

    assert_eq!(stored.category, Category::Documents);
    assert_eq!(stored.filename, "报告.pdf");
    assert_eq!(stored.relative_path(), "documents/报告.pdf");
    assert!(store.root().path().join("documents/报告.pdf").is_file());
}

#[tokio::test]
async fn test_repeat_upload_gets_stamped_name() {
    let (store, _temp) = common::setup_test_env().await;
    let name = common::mangle("报告.pdf");

    let first = store
        .ingest(
            common::request(&name, Some("application/pdf")),
            common::body(b"first"),
        )
        .await
        .unwrap();
    let second = store
        .ingest(
            common::request(&name, Some("application/pdf")),
            common::body(b"second"),
        )
        .await
        .unwrap();

    assert_eq!(first.filename, "报告.pdf");
    let stamp = second
        .filename
        .strip_prefix("报告-")
        .and_then(|rest| rest.strip_suffix(".pdf"))
        .unwrap();
    assert!(!stamp.is_empty());
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));

    let docs = store.root().path().join("documents");
    assert_eq!(std::fs::read(docs.join("报告.pdf")).unwrap(), b"first");
    assert_eq!(std::fs::read(docs.join(&second.filename)).unwrap(), b"second");
}

#[tokio::test]
async fn test_repeat_upload_of_long_name_is_shortened() {
    let (store, _temp) = common::setup_test_env().await;
    let name = format!("{}.txt", "a".repeat(250));

    let first = store
        .ingest(common::request(&name, Some("text/plain")), common::body(b"one"))
        .await
        .unwrap();
    let second = store
        .ingest(common::request(&name, Some("text/plain")), common::body(b"two"))
        .await
        .unwrap();

    assert_eq!(first.filename, name);
    assert_ne!(second.filename, first.filename);
    assert!(second.filename.len() <= 255);
    assert!(second.filename.starts_with("aaaa"));
    assert!(second.filename.ends_with(".txt"));

    let docs = store.root().path().join("documents");
    assert_eq!(std::fs::read(docs.join(&first.filename)).unwrap(), b"one");
    assert_eq!(std::fs::read(docs.join(&second.filename)).unwrap(), b"two");
    assert_eq!(common::staging_len(&store), 0);
}

#[tokio::test]
async fn test_explicit_category_wins_over_namespace() {
    let (store, _temp) = common::setup_test_env().await;
    let request = UploadRequest {
        filename: "logo.png".into(),
        mime_type: Some("image/png".into()),
        category: Some(Category::Fonts),
        namespace: Some("branding".parse().unwrap()),
        limit: None,
    };

    let stored = store.ingest(request, common::body(b"png")).await.unwrap();

    assert_eq!(stored.relative_path(), "fonts/logo.png");
    assert_eq!(stored.category, Category::Fonts);
    assert_eq!(stored.namespace, None);
    assert!(!store.root().path().join("branding").exists());
}

#[tokio::test]
async fn test_namespace_upload_reports_detected_category() {
    let (store, _temp) = common::setup_test_env().await;
    let namespace: Namespace = "projects/alpha".parse().unwrap();
    let request = UploadRequest {
        namespace: Some(namespace),
        ..common::request("clip.mp4", Some("video/mp4"))
    };

    let stored = store.ingest(request, common::body(b"frames")).await.unwrap();

    assert_eq!(stored.relative_path(), "projects/alpha/clip.mp4");
    assert_eq!(stored.namespace.as_deref(), Some("projects/alpha"));
    assert_eq!(stored.category, Category::Videos);
}

#[tokio::test]
async fn test_unknown_type_lands_in_others() {
    let (store, _temp) = common::setup_test_env().await;

    let stored = store
        .ingest(common::request("blob.zzz", None), common::body(b"?"))
        .await
        .unwrap();

    assert_eq!(stored.category, Category::Others);
    assert_eq!(stored.relative_path(), "others/blob.zzz");
}

#[tokio::test]
async fn test_traversal_in_declared_name_is_stripped() {
    let (store, _temp) = common::setup_test_env().await;

    let stored = store
        .ingest(
            common::request("../../etc/passwd.txt", Some("text/plain")),
            common::body(b"x"),
        )
        .await
        .unwrap();

    assert_eq!(stored.relative_path(), "documents/passwd.txt");
}

#[tokio::test]
async fn test_oversized_upload_leaves_nothing_behind() {
    let (store, _temp) = common::setup_test_env().await;
    let request = UploadRequest {
        limit: Some(10),
        ..common::request("big.bin", None)
    };

    let err = store
        .ingest(request, common::body(&[0u8; 64]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SizeLimitExceeded);
    assert_eq!(common::staging_len(&store), 0);
    assert!(!store.root().path().join("others").exists());
}

#[tokio::test]
async fn test_interrupted_stream_leaves_nothing_behind() {
    let (store, _temp) = common::setup_test_env().await;
    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"half of ")),
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
    ];

    let err = store
        .ingest(
            common::request("half.txt", Some("text/plain")),
            futures::stream::iter(chunks),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Interrupted(_)));
    assert_eq!(common::staging_len(&store), 0);
    assert!(!store.root().path().join("documents/half.txt").exists());
}

#[tokio::test]
async fn test_sequential_same_name_uploads_never_collide() {
    let (store, _temp) = common::setup_counting_env(CommitMode::Auto).await;

    let mut names = HashSet::new();
    for i in 0..20u8 {
        let stored = store
            .ingest(common::request("same.txt", Some("text/plain")), common::body(&[i]))
            .await
            .unwrap();
        let on_disk = std::fs::read(store.root().path().join(stored.relative_path())).unwrap();
        assert_eq!(on_disk, vec![i]);
        assert!(names.insert(stored.filename));
    }

    let listed = store.list_entries(Some("documents")).await.unwrap();
    assert_eq!(listed.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_uploads_never_overwrite() {
    let (store, _temp) = common::setup_test_env().await;

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let payload = vec![i; 1024];
            let stored = store
                .ingest(
                    common::request("race.bin", Some("application/zip")),
                    common::body(&payload),
                )
                .await
                .unwrap();
            (stored, payload)
        }));
    }

    let mut names = HashSet::new();
    for handle in handles {
        let (stored, payload) = handle.await.unwrap();
        assert_eq!(stored.category, Category::Archives);
        let on_disk = std::fs::read(store.root().path().join(stored.relative_path())).unwrap();
        assert_eq!(on_disk, payload);
        assert!(names.insert(stored.filename));
    }
    assert_eq!(names.len(), 16);
    assert_eq!(common::staging_len(&store), 0);
}

#[tokio::test]
async fn test_copy_mode_ingest_matches_link_mode() {
    let (store, _temp) = common::setup_counting_env(CommitMode::Copy).await;

    let first = store
        .ingest(common::request("song.mp3", Some("audio/mpeg")), common::body(b"one"))
        .await
        .unwrap();
    let second = store
        .ingest(common::request("song.mp3", Some("audio/mpeg")), common::body(b"two"))
        .await
        .unwrap();

    assert_eq!(first.relative_path(), "audios/song.mp3");
    assert_eq!(second.relative_path(), "audios/song-1.mp3");

    let names: Vec<_> = store
        .list_entries(Some("audios"))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["song-1.mp3", "song.mp3"]);
    assert_eq!(common::staging_len(&store), 0);
}

#[tokio::test]
async fn test_sweep_through_store() {
    let (store, _temp) = common::setup_test_env().await;
    let abandoned = store.root().staging_dir().join("abandoned.part");
    std::fs::write(&abandoned, b"left over").unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let removed = store
        .sweep(std::time::Duration::from_millis(1))
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(!abandoned.exists());
    assert!(store.is_ready().await);
}

#[tokio::test]
async fn test_stage_rename_commit() {
    let (store, _temp) = common::setup_test_env().await;

    let mut pending = store
        .stage("IMG_0001.png", Some("image/png".into()), common::body(b"png"), None)
        .await
        .unwrap();
    assert_eq!(pending.filename(), "IMG_0001.png");
    assert_eq!(pending.size(), 3);
    assert_eq!(common::staging_len(&store), 1);

    pending.rename("alice.png");
    let namespace: Namespace = "avatars".parse().unwrap();
    let stored = store.commit(pending, None, Some(&namespace)).await.unwrap();

    assert_eq!(stored.relative_path(), "avatars/alice.png");
    assert_eq!(stored.category, Category::Images);
    assert_eq!(common::staging_len(&store), 0);
}

#[tokio::test]
async fn test_discarded_upload_leaves_nothing_behind() {
    let (store, _temp) = common::setup_test_env().await;

    let pending = store
        .stage("draft.txt", None, common::body(b"draft"), None)
        .await
        .unwrap();
    pending.discard().await;

    assert_eq!(common::staging_len(&store), 0);
    assert!(store.list_entries(None).await.unwrap().is_empty());
}
