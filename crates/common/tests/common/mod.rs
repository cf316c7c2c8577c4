//! Shared test utilities for store integration tests
#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use common::category::CategoryTable;
use common::collision::Counter;
use common::finalize::CommitMode;
use common::store::{Store, StoreConfig, UploadRequest};
use futures::Stream;
use tempfile::TempDir;

/// Set up a store rooted in a fresh temporary directory
pub async fn setup_test_env() -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::new(temp_dir.path().join("storage")))
        .await
        .unwrap();
    (store, temp_dir)
}

/// Same as [`setup_test_env`] but with a deterministic disambiguator and an
/// explicit commit mode
pub async fn setup_counting_env(mode: CommitMode) -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig {
        root: temp_dir.path().join("storage"),
        commit_mode: mode,
    };
    let store = Store::open_with(config, CategoryTable::builtin(), Arc::new(Counter::default()))
        .await
        .unwrap();
    (store, temp_dir)
}

pub fn body(data: &[u8]) -> impl Stream<Item = Result<Bytes, io::Error>> {
    let chunks: Vec<Result<Bytes, io::Error>> = data
        .chunks(7)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks)
}

pub fn request(filename: &str, mime_type: Option<&str>) -> UploadRequest {
    UploadRequest {
        filename: filename.to_string(),
        mime_type: mime_type.map(str::to_string),
        ..Default::default()
    }
}

/// `name` as it arrives after its UTF-8 bytes were read as Latin-1
pub fn mangle(name: &str) -> String {
    name.bytes().map(char::from).collect()
}

/// Number of entries left in the staging tree
pub fn staging_len(store: &Store) -> usize {
    std::fs::read_dir(store.root().staging_dir()).unwrap().count()
}
