use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::collision::{disambiguate, Disambiguator};
use crate::error::{IoContext, StoreError};
use crate::layout::sanitize_filename;

const MAX_CREATE_ATTEMPTS: usize = 32;

/// A fully written upload waiting in the staging tree.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the artifact, logging rather than returning failures.
    pub async fn discard(self) {
        discard(&self.path).await;
    }
}

pub(crate) async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed staging artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove staging artifact"
        ),
    }
}

/// The `temp/` subtree where uploads are written before they are committed.
///
/// Artifacts here belong to the request that created them; nothing else reads
/// them. Artifacts abandoned by dropped connections are recognisable by age
/// and removed by [`StagingArea::sweep`].
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    disambiguator: Arc<dyn Disambiguator>,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>, disambiguator: Arc<dyn Disambiguator>) -> Self {
        Self {
            dir: dir.into(),
            disambiguator,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `stream` to a new staging artifact.
    ///
    /// Returns only once every byte is written and synced. On any failure the
    /// partial artifact is removed before the error is returned.
    pub async fn stage<S, E>(
        &self,
        declared_name: &str,
        stream: S,
        limit: Option<u64>,
    ) -> Result<StagedFile, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .op("create staging directory")?;

        let (path, file) = self.create_exclusive(&sanitize_filename(declared_name)).await?;
        tracing::debug!(path = %path.display(), "staging upload");

        match write_stream(file, stream, limit).await {
            Ok(size) => Ok(StagedFile { path, size }),
            Err(e) => {
                discard(&path).await;
                Err(e)
            }
        }
    }

    async fn create_exclusive(&self, name: &str) -> Result<(PathBuf, File), StoreError> {
        let mut candidate = name.to_string();
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = self.dir.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = disambiguate(name, self.disambiguator.next());
                }
                Err(e) => return Err(StoreError::io("create staging artifact", e)),
            }
        }
        Err(StoreError::Conflict(format!(
            "no free staging name for '{}'",
            name
        )))
    }

    /// Remove staging artifacts last modified more than `max_age` ago.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::io("read staging directory", e)),
        };
        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.op("read staging directory")? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age > max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "failed to sweep staging artifact"
                    ),
                }
            }
        }
        tracing::info!(removed, "staging sweep finished");
        Ok(removed)
    }
}

async fn write_stream<S, E>(mut file: File, stream: S, limit: Option<u64>) -> Result<u64, StoreError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StoreError::Interrupted(e.into()))?;
        written += chunk.len() as u64;
        if let Some(limit) = limit {
            if written > limit {
                return Err(StoreError::SizeLimitExceeded { limit });
            }
        }
        file.write_all(&chunk).await.op("write staging artifact")?;
    }
    file.flush().await.op("flush staging artifact")?;
    file.sync_all().await.op("sync staging artifact")?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::collision::Counter;

    fn area(dir: &Path) -> StagingArea {
        StagingArea::new(dir.join("temp"), Arc::new(Counter::default()))
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let items: Vec<Result<Bytes, io::Error>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn test_stage_writes_all_bytes() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());

        let staged = staging
            .stage("../evil/name.bin", chunks(&[b"hello ", b"world"]), None)
            .await
            .unwrap();

        assert_eq!(staged.size(), 11);
        assert_eq!(staged.path(), root.path().join("temp/name.bin"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_stage_same_name_twice_gets_distinct_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());

        let first = staging.stage("a.txt", chunks(&[b"1"]), None).await.unwrap();
        let second = staging.stage("a.txt", chunks(&[b"2"]), None).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(second.path().file_name().unwrap(), "a-1.txt");
    }

    #[tokio::test]
    async fn test_overflow_removes_partial_artifact() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());

        let result = staging
            .stage("big.bin", chunks(&[b"12345", b"67890"]), Some(8))
            .await;

        assert!(matches!(result, Err(StoreError::SizeLimitExceeded { limit: 8 })));
        assert_eq!(std::fs::read_dir(staging.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_exact_limit_is_accepted() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());

        let staged = staging
            .stage("fits.bin", chunks(&[b"1234", b"5678"]), Some(8))
            .await
            .unwrap();
        assert_eq!(staged.size(), 8);
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial_artifact() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());
        let items: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];

        let result = staging
            .stage("drop.bin", futures::stream::iter(items), None)
            .await;

        assert!(matches!(result, Err(StoreError::Interrupted(_))));
        assert_eq!(std::fs::read_dir(staging.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path());
        let staged = staging.stage("old.bin", chunks(&[b"x"]), None).await.unwrap();

        assert_eq!(staging.sweep(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(staged.path().exists());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(staging.sweep(Duration::from_millis(1)).await.unwrap(), 1);
        assert!(!staged.path().exists());
    }

    #[tokio::test]
    async fn test_sweep_without_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(area(root.path()).sweep(Duration::ZERO).await.unwrap(), 0);
    }
}
