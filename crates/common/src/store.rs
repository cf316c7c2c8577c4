use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tracing::Instrument;

use crate::category::{extension_of, Category, CategoryTable};
use crate::collision::{Disambiguator, MonotonicStamp};
use crate::directory::{DirectoryManager, Entry, EntryKind, StoredFile};
use crate::encoding;
use crate::error::{IoContext, StoreError};
use crate::finalize::{CommitMode, Finalizer};
use crate::layout::{
    sanitize_filename, Axis, Namespace, PathResolver, StorageRoot, PART_FILE_PREFIX,
};
use crate::negotiate::{ContentNegotiator, NegotiatedHeaders};
use crate::staging::{StagedFile, StagingArea};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub commit_mode: CommitMode,
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit_mode: CommitMode::default(),
        }
    }
}

/// Routing and naming inputs of one upload, as declared by the client.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub filename: String,
    pub mime_type: Option<String>,
    pub category: Option<Category>,
    pub namespace: Option<Namespace>,
    /// Maximum accepted size in bytes.
    pub limit: Option<u64>,
}

/// An upload that is fully staged but not yet committed.
#[derive(Debug)]
pub struct PendingUpload {
    staged: StagedFile,
    filename: String,
    mime_type: Option<String>,
}

impl PendingUpload {
    /// Repaired, sanitized name the upload will be committed under.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.staged.size()
    }

    /// Commit under `name` instead of the declared filename.
    pub fn rename(&mut self, name: &str) {
        self.filename = sanitize_filename(name);
    }

    pub async fn discard(self) {
        self.staged.discard().await;
    }
}

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Received,
    Staged,
    Resolving,
    Committed,
    Failed,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Received => "received",
            UploadState::Staged => "staged",
            UploadState::Resolving => "resolving",
            UploadState::Committed => "committed",
            UploadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The storage core: staging, routing, committing, and the directory tree.
#[derive(Debug, Clone)]
pub struct Store {
    root: StorageRoot,
    categories: Arc<CategoryTable>,
    staging: StagingArea,
    resolver: PathResolver,
    finalizer: Finalizer,
    directories: DirectoryManager,
    negotiator: ContentNegotiator,
}

impl Store {
    /// Open (creating if needed) a store at `config.root` with the builtin
    /// category table.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        Self::open_with(config, CategoryTable::builtin(), Arc::new(MonotonicStamp::new())).await
    }

    pub async fn open_with(
        config: StoreConfig,
        categories: CategoryTable,
        disambiguator: Arc<dyn Disambiguator>,
    ) -> Result<Self, StoreError> {
        let root = StorageRoot::new(config.root);
        tokio::fs::create_dir_all(root.staging_dir())
            .await
            .op("create storage root")?;

        for duplicate in categories.duplicates() {
            tracing::warn!(
                key = %duplicate.key,
                kept = %duplicate.kept,
                ignored = %duplicate.ignored,
                "duplicate category mapping"
            );
        }

        let categories = Arc::new(categories);
        Ok(Self {
            staging: StagingArea::new(root.staging_dir(), disambiguator.clone()),
            resolver: PathResolver::new(root.clone(), categories.clone()),
            finalizer: Finalizer::new(config.commit_mode, disambiguator),
            directories: DirectoryManager::new(root.clone(), categories.clone()),
            negotiator: ContentNegotiator::new(),
            categories,
            root,
        })
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn directories(&self) -> &DirectoryManager {
        &self.directories
    }

    /// Stage `body`, route it, and commit it under a free name.
    pub async fn ingest<S, E>(
        &self,
        request: UploadRequest,
        body: S,
    ) -> Result<StoredFile, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let pending = self
            .stage(&request.filename, request.mime_type, body, request.limit)
            .await?;
        self.commit(pending, request.category, request.namespace.as_ref())
            .await
    }

    /// First half of [`Store::ingest`]: repair the declared name and write
    /// the body into the staging tree.
    ///
    /// The caller owns the returned [`PendingUpload`] and must either
    /// [`commit`](Store::commit) or [`discard`](PendingUpload::discard) it.
    pub async fn stage<S, E>(
        &self,
        declared_name: &str,
        mime_type: Option<String>,
        body: S,
        limit: Option<u64>,
    ) -> Result<PendingUpload, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let filename = sanitize_filename(&encoding::fix(declared_name));
        let span = tracing::debug_span!("stage", filename = %filename);
        async move {
            tracing::debug!(state = %UploadState::Received);
            match self.staging.stage(&filename, body, limit).await {
                Ok(staged) => {
                    tracing::debug!(state = %UploadState::Staged, size = staged.size());
                    Ok(PendingUpload {
                        staged,
                        filename,
                        mime_type,
                    })
                }
                Err(e) => {
                    tracing::debug!(state = %UploadState::Failed, error = %e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Second half of [`Store::ingest`]: pick the destination and commit.
    ///
    /// An explicit `category` wins over `namespace`; with neither, the file
    /// is classified.
    pub async fn commit(
        &self,
        pending: PendingUpload,
        category: Option<Category>,
        namespace: Option<&Namespace>,
    ) -> Result<StoredFile, StoreError> {
        let span = tracing::debug_span!("commit", filename = %pending.filename);
        async move {
            let result = self.commit_inner(pending, category, namespace).await;
            if let Err(e) = &result {
                tracing::debug!(state = %UploadState::Failed, error = %e);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn commit_inner(
        &self,
        pending: PendingUpload,
        category: Option<Category>,
        namespace: Option<&Namespace>,
    ) -> Result<StoredFile, StoreError> {
        let PendingUpload {
            staged,
            filename,
            mime_type,
        } = pending;

        tracing::debug!(state = %UploadState::Resolving);
        let destination =
            self.resolver
                .resolve(category, namespace, mime_type.as_deref(), &filename);

        let final_path = self
            .finalizer
            .commit(staged, &destination.dir, &filename)
            .await?;

        let metadata = tokio::fs::metadata(&final_path)
            .await
            .op("stat committed file")?;
        let mut stored = self.directories.describe(&final_path, &metadata);
        match destination.axis {
            Axis::Category(category) => {
                stored.category = category;
                stored.namespace = None;
            }
            Axis::Namespace(namespace) => {
                stored.category = self.categories.classify(mime_type.as_deref(), &filename);
                stored.namespace = Some(namespace.to_string());
            }
        }

        tracing::info!(
            state = %UploadState::Committed,
            path = %stored.relative_path(),
            size = stored.size,
            category = %stored.category,
            "upload committed"
        );
        Ok(stored)
    }

    pub async fn create_directory(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String, StoreError> {
        self.directories.create_directory(parent, name).await
    }

    pub async fn delete_entry(&self, path: &str) -> Result<EntryKind, StoreError> {
        self.directories.delete_entry(path).await
    }

    pub async fn list_entries(&self, directory: Option<&str>) -> Result<Vec<Entry>, StoreError> {
        self.directories.list_entries(directory).await
    }

    pub async fn stat_file(&self, directory: &str, name: &str) -> Result<StoredFile, StoreError> {
        self.directories.stat_file(directory, name).await
    }

    /// Remove abandoned staging artifacts older than `max_age`.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize, StoreError> {
        self.staging.sweep(max_age).await
    }

    /// Locate a stored file for serving, with its negotiated headers.
    pub async fn open_for_serving(
        &self,
        relative: &str,
        download: bool,
    ) -> Result<(PathBuf, NegotiatedHeaders), StoreError> {
        let path = self.root.resolve_relative(relative)?;
        let display = self.root.relative_display(&path);
        let is_part_file = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(PART_FILE_PREFIX));
        if is_part_file {
            return Err(StoreError::NotFound(format!("file '{}'", display)));
        }
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(StoreError::NotFound(format!("file '{}'", display))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!("file '{}'", display)))
            }
            Err(e) => return Err(StoreError::io("stat file", e)),
        }
        let extension = file_extension(&path);
        let headers = self.negotiator.headers(extension.as_deref(), download);
        Ok((path, headers))
    }

    /// Readiness: the root and its staging tree are present directories.
    pub async fn is_ready(&self) -> bool {
        for dir in [self.root.path().to_path_buf(), self.root.staging_dir()] {
            match tokio::fs::metadata(&dir).await {
                Ok(metadata) if metadata.is_dir() => {}
                _ => return false,
            }
        }
        true
    }
}

fn file_extension(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| extension_of(&name.to_string_lossy()))
}
