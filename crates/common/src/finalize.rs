//! Atomic, exclusive commit of staged uploads.
//!
//! A name in a storage directory is claimed with `link(2)`, which fails with
//! `EEXIST` instead of replacing an existing entry. The linked file is already
//! complete, so readers see either nothing or the whole file, and two commits
//! racing for the same name can never overwrite each other; the loser simply
//! retries with a disambiguated name.
//!
//! When the staging tree and the destination live on different volumes the
//! bytes are first copied to a hidden part file next to the destination,
//! synced, and that part file is then claimed the same way.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collision::{disambiguate, Disambiguator};
use crate::error::{IoContext, StoreError};
use crate::layout::PART_FILE_PREFIX;
use crate::staging::{discard, StagedFile};

const MAX_CLAIM_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Link in place; fall back to copying when the link crosses devices.
    #[default]
    Auto,
    /// Always copy into the destination volume first.
    Copy,
}

#[derive(Debug, Clone)]
pub struct Finalizer {
    mode: CommitMode,
    disambiguator: Arc<dyn Disambiguator>,
}

impl Finalizer {
    pub fn new(mode: CommitMode, disambiguator: Arc<dyn Disambiguator>) -> Self {
        Self {
            mode,
            disambiguator,
        }
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    /// Move `staged` into `target_dir`, under `desired_name` or a
    /// disambiguated variant of it, and return the final path.
    ///
    /// The staging artifact is gone afterwards whether or not the commit
    /// succeeded.
    pub async fn commit(
        &self,
        staged: StagedFile,
        target_dir: &Path,
        desired_name: &str,
    ) -> Result<PathBuf, StoreError> {
        let result = self.commit_inner(&staged, target_dir, desired_name).await;
        // On success the artifact is unlinked as the last step of the move;
        // on failure it is cleanup.
        staged.discard().await;
        result
    }

    async fn commit_inner(
        &self,
        staged: &StagedFile,
        target_dir: &Path,
        desired_name: &str,
    ) -> Result<PathBuf, StoreError> {
        ensure_dir(target_dir).await?;

        if self.mode == CommitMode::Auto {
            match self.claim(staged.path(), target_dir, desired_name).await {
                Err(ClaimError::Io(e)) if crosses_devices(&e) => {
                    tracing::debug!(
                        target_dir = %target_dir.display(),
                        "staging and destination are on different volumes, copying"
                    );
                }
                other => return other.map_err(|e| e.into_store_error(desired_name)),
            }
        }

        self.copy_then_claim(staged.path(), target_dir, desired_name)
            .await
    }

    async fn copy_then_claim(
        &self,
        source: &Path,
        target_dir: &Path,
        desired_name: &str,
    ) -> Result<PathBuf, StoreError> {
        let part = target_dir.join(format!("{}{}.part", PART_FILE_PREFIX, uuid::Uuid::new_v4()));
        let result = async {
            tokio::fs::copy(source, &part).await.op("copy to destination volume")?;
            tokio::fs::OpenOptions::new()
                .write(true)
                .open(&part)
                .await
                .op("open part file")?
                .sync_all()
                .await
                .op("sync part file")?;
            self.claim(&part, target_dir, desired_name)
                .await
                .map_err(|e| e.into_store_error(desired_name))
        }
        .await;
        discard(&part).await;
        result
    }

    /// Link `source` into `target_dir` under the first free candidate name.
    async fn claim(
        &self,
        source: &Path,
        target_dir: &Path,
        desired_name: &str,
    ) -> Result<PathBuf, ClaimError> {
        let mut candidate = desired_name.to_string();
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let target = target_dir.join(&candidate);
            match tokio::fs::hard_link(source, &target).await {
                Ok(()) => return Ok(target),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(name = %candidate, "name taken, disambiguating");
                    candidate = disambiguate(desired_name, self.disambiguator.next());
                }
                Err(e) => return Err(ClaimError::Io(e)),
            }
        }
        Err(ClaimError::Exhausted)
    }
}

enum ClaimError {
    Io(io::Error),
    Exhausted,
}

impl ClaimError {
    fn into_store_error(self, desired_name: &str) -> StoreError {
        match self {
            ClaimError::Io(e) => StoreError::io("commit upload", e),
            ClaimError::Exhausted => StoreError::Conflict(format!(
                "could not find a free name for '{}'",
                desired_name
            )),
        }
    }
}

#[cfg(unix)]
const CROSS_DEVICE_LINK: i32 = 18; // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_LINK: i32 = 17; // ERROR_NOT_SAME_DEVICE

fn crosses_devices(e: &io::Error) -> bool {
    e.raw_os_error() == Some(CROSS_DEVICE_LINK)
}

/// Create `dir` and any missing ancestors. An existing directory, including
/// one created concurrently, is success.
pub async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .op("create target directory")
}
