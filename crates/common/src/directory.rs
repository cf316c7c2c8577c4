use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryTable};
use crate::error::{IoContext, StoreError};
use crate::layout::{validate_segment, StorageRoot, PART_FILE_PREFIX, STAGING_DIR_NAME};

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

/// A committed file in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Root-relative directory.
    pub directory: String,
    pub filename: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub category: Category,
    pub namespace: Option<String>,
}

impl StoredFile {
    /// Root-relative path, `directory/filename`.
    pub fn relative_path(&self) -> String {
        if self.directory.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.directory, self.filename)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
        }
    }
}

/// Create, list, stat and delete entries beneath the storage root.
#[derive(Debug, Clone)]
pub struct DirectoryManager {
    root: StorageRoot,
    categories: Arc<CategoryTable>,
}

impl DirectoryManager {
    pub fn new(root: StorageRoot, categories: Arc<CategoryTable>) -> Self {
        Self { root, categories }
    }

    /// Create `name`, optionally under an existing `parent`.
    pub async fn create_directory(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String, StoreError> {
        let name = name.trim_matches('/');
        validate_segment(name)?;

        let base = match parent {
            Some(parent) => self.root.resolve_relative(parent)?,
            None => self.root.path().to_path_buf(),
        };
        let at_root = base == self.root.path();
        if at_root && name == STAGING_DIR_NAME {
            return Err(StoreError::Validation(format!(
                "'{}' is reserved",
                STAGING_DIR_NAME
            )));
        }
        if at_root {
            tokio::fs::create_dir_all(&base)
                .await
                .op("create storage root")?;
        } else if !is_dir(&base).await? {
            return Err(StoreError::NotFound(format!(
                "parent directory '{}'",
                self.root.relative_display(&base)
            )));
        }

        let target = base.join(name);
        let relative = self.root.relative_display(&target);
        match tokio::fs::create_dir(&target).await {
            Ok(()) => {
                tracing::info!(path = %relative, "created directory");
                Ok(relative)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(format!("'{}'", relative)))
            }
            Err(e) => Err(StoreError::io("create directory", e)),
        }
    }

    /// Delete a file, or a directory only when it is empty.
    pub async fn delete_entry(&self, path: &str) -> Result<EntryKind, StoreError> {
        let target = self.root.resolve_relative(path)?;
        if target == self.root.path() {
            return Err(StoreError::Validation(
                "the storage root cannot be deleted".into(),
            ));
        }
        let relative = self.root.relative_display(&target);
        let metadata = metadata_or_not_found(&target, &relative).await?;

        if !metadata.is_dir() {
            tokio::fs::remove_file(&target)
                .await
                .map_err(|e| not_found_or_io(e, &relative, "delete file"))?;
            tracing::info!(path = %relative, "deleted file");
            return Ok(EntryKind::File);
        }

        let item_count = count_entries(&target).await?;
        if item_count > 0 {
            return Err(StoreError::NonEmptyDirectory {
                path: relative,
                item_count,
            });
        }
        match tokio::fs::remove_dir(&target).await {
            Ok(()) => {
                tracing::info!(path = %relative, "deleted directory");
                Ok(EntryKind::Directory)
            }
            Err(e) => {
                // Something may have landed in it between the count and the removal.
                let item_count = count_entries(&target).await.unwrap_or(0);
                if item_count > 0 {
                    Err(StoreError::NonEmptyDirectory {
                        path: relative,
                        item_count,
                    })
                } else {
                    Err(not_found_or_io(e, &relative, "delete directory"))
                }
            }
        }
    }

    /// List the children of `directory` (the root when `None`), sorted by name.
    pub async fn list_entries(&self, directory: Option<&str>) -> Result<Vec<Entry>, StoreError> {
        let dir = self.root.resolve_relative(directory.unwrap_or(""))?;
        let relative = self.root.relative_display(&dir);
        let at_root = dir == self.root.path();

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if is_missing(&e) => {
                return Err(StoreError::NotFound(format!("directory '{}'", relative)))
            }
            Err(e) => return Err(StoreError::io("read directory", e)),
        };

        let mut entries = Vec::new();
        while let Some(child) = reader.next_entry().await.op("read directory")? {
            let name = child.file_name().to_string_lossy().to_string();
            if is_hidden_machinery(&name, at_root) {
                continue;
            }
            // Entries removed while listing are skipped.
            let Ok(metadata) = child.metadata().await else {
                continue;
            };
            let is_directory = metadata.is_dir();
            entries.push(Entry {
                name,
                is_directory,
                size: if is_directory { 0 } else { metadata.len() },
                modified: modified(&metadata),
                created: created(&metadata),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Metadata of one stored file.
    pub async fn stat_file(&self, directory: &str, name: &str) -> Result<StoredFile, StoreError> {
        validate_segment(name)?;
        let dir = self.root.resolve_relative(directory)?;
        let path = dir.join(name);
        let relative = self.root.relative_display(&path);
        let metadata = metadata_or_not_found(&path, &relative).await?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(format!("file '{}'", relative)));
        }
        Ok(self.describe(&path, &metadata))
    }

    /// Build a [`StoredFile`] for a path under the root.
    pub(crate) fn describe(&self, path: &Path, metadata: &Metadata) -> StoredFile {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let directory = path
            .parent()
            .map(|p| self.root.relative_display(p))
            .unwrap_or_default();
        let is_category_dir = directory
            .parse::<Category>()
            .map(|_| true)
            .unwrap_or(false);
        let mime = mime_guess::from_path(&filename).first_raw();
        StoredFile {
            category: self.categories.classify(mime, &filename),
            namespace: (!directory.is_empty() && !is_category_dir).then(|| directory.clone()),
            directory,
            filename,
            size: metadata.len(),
            modified: modified(metadata),
            created: created(metadata),
        }
    }

    pub fn root(&self) -> &StorageRoot {
        &self.root
    }
}

fn is_hidden_machinery(name: &str, at_root: bool) -> bool {
    (at_root && name == STAGING_DIR_NAME) || name.starts_with(PART_FILE_PREFIX)
}

async fn is_dir(path: &Path) -> Result<bool, StoreError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if is_missing(&e) => Ok(false),
        Err(e) => Err(StoreError::io("stat directory", e)),
    }
}

async fn metadata_or_not_found(path: &Path, relative: &str) -> Result<Metadata, StoreError> {
    tokio::fs::metadata(path)
        .await
        .map_err(|e| not_found_or_io(e, relative, "stat entry"))
}

async fn count_entries(dir: &Path) -> Result<usize, StoreError> {
    let mut reader = tokio::fs::read_dir(dir).await.op("read directory")?;
    let mut count = 0;
    while reader.next_entry().await.op("read directory")?.is_some() {
        count += 1;
    }
    Ok(count)
}

fn not_found_or_io(e: io::Error, relative: &str, op: &'static str) -> StoreError {
    if is_missing(&e) {
        StoreError::NotFound(format!("'{}'", relative))
    } else {
        StoreError::io(op, e)
    }
}

fn is_missing(e: &io::Error) -> bool {
    // A path through a regular file reports ENOTDIR on unix.
    e.kind() == io::ErrorKind::NotFound || (cfg!(unix) && e.raw_os_error() == Some(20))
}

fn modified(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

fn created(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata.created().ok().map(DateTime::<Utc>::from)
}
