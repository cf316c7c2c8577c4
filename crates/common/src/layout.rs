//! On-disk layout of the storage root and routing of uploads into it.
//!
//! ```text
//! root/
//!   temp/                 staging artifacts, never listed
//!   <category>/<file>     auto-routed or explicit category
//!   <namespace>/<file>    caller-chosen directory
//!   <parent>/<child>/...  namespace nested under a parent
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::category::{Category, CategoryTable};
use crate::error::StoreError;

/// Name of the staging subtree directly under the root.
pub const STAGING_DIR_NAME: &str = "temp";

/// Prefix of hidden part files written by cross-volume commits.
pub const PART_FILE_PREFIX: &str = ".depot-";

/// Longest single path component most filesystems accept, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

const UNNAMED: &str = "unnamed";

/// Absolute storage root plus the rules for turning request data into paths
/// beneath it.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    /// Resolve a caller-supplied, root-relative path.
    ///
    /// Leading and trailing slashes are ignored and the empty path is the
    /// root itself. Traversal segments and anything under the staging tree
    /// are rejected.
    pub fn resolve_relative(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let segments = split_segments(relative)?;
        if segments.first() == Some(&STAGING_DIR_NAME) {
            return Err(StoreError::Validation(format!(
                "'{}' is reserved",
                STAGING_DIR_NAME
            )));
        }
        Ok(segments
            .into_iter()
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    /// Root-relative form of `path`, with `/` separators.
    pub fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn split_segments(relative: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = relative.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| validate_segment(segment).map(|_| segment))
        .collect()
}

/// Check one directory or file name segment.
pub fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() {
        return Err(StoreError::Validation("empty path segment".into()));
    }
    if segment == "." || segment == ".." {
        return Err(StoreError::Validation(format!(
            "path segment '{}' is not allowed",
            segment
        )));
    }
    if segment.contains(['/', '\\', '\0']) {
        return Err(StoreError::Validation(format!(
            "path segment '{}' contains a separator",
            segment
        )));
    }
    Ok(())
}

/// A caller-chosen top-level directory, optionally nested one level under a
/// parent namespace (`parent/child`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Namespace {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = split_segments(s)?;
        match segments.as_slice() {
            [] => Err(StoreError::Validation("namespace must not be empty".into())),
            [first, ..] if *first == STAGING_DIR_NAME => Err(StoreError::Validation(format!(
                "'{}' is reserved",
                STAGING_DIR_NAME
            ))),
            [_] | [_, _] => Ok(Namespace(segments.join("/"))),
            _ => Err(StoreError::Validation(
                "namespaces nest at most one level".into(),
            )),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which routing rule picked the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Axis {
    Category(Category),
    Namespace(Namespace),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub dir: PathBuf,
    /// Root-relative directory with `/` separators.
    pub relative: String,
    pub axis: Axis,
}

impl Destination {
    pub fn namespace(&self) -> Option<&Namespace> {
        match &self.axis {
            Axis::Namespace(ns) => Some(ns),
            Axis::Category(_) => None,
        }
    }
}

/// Chooses the target directory for an upload. Performs no I/O.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: StorageRoot,
    categories: Arc<CategoryTable>,
}

impl PathResolver {
    pub fn new(root: StorageRoot, categories: Arc<CategoryTable>) -> Self {
        Self { root, categories }
    }

    /// Explicit category, then explicit namespace, then auto-detection.
    pub fn resolve(
        &self,
        category: Option<Category>,
        namespace: Option<&Namespace>,
        mime_type: Option<&str>,
        filename: &str,
    ) -> Destination {
        let axis = match (category, namespace) {
            (Some(category), _) => Axis::Category(category),
            (None, Some(namespace)) => Axis::Namespace(namespace.clone()),
            (None, None) => Axis::Category(self.categories.classify(mime_type, filename)),
        };
        let relative = match &axis {
            Axis::Category(category) => category.as_str().to_string(),
            Axis::Namespace(namespace) => namespace.as_str().to_string(),
        };
        let dir = relative
            .split('/')
            .fold(self.root.path().to_path_buf(), |path, segment| {
                path.join(segment)
            });
        Destination {
            dir,
            relative,
            axis,
        }
    }
}

/// Reduce a declared filename to a safe final path component.
pub fn sanitize_filename(declared: &str) -> String {
    let last = declared.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return UNNAMED.to_string();
    }
    let (stem, ext) = split_extension(cleaned);
    fit_name(stem, ext)
}

/// Split `name` before its last dot. A leading dot does not start an
/// extension, so `.bashrc` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// `stem` followed by `suffix`, cutting the stem on a char boundary so the
/// result fits in [`MAX_NAME_BYTES`].
///
/// A suffix that cannot fit next to a one-byte stem is treated as part of
/// the stem and truncated with it.
pub fn fit_name(stem: &str, suffix: &str) -> String {
    if suffix.len() >= MAX_NAME_BYTES {
        return truncate_bytes(&format!("{}{}", stem, suffix), MAX_NAME_BYTES).to_string();
    }
    let budget = MAX_NAME_BYTES - suffix.len();
    format!("{}{}", truncate_bytes(stem, budget), suffix)
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(
            StorageRoot::new("/srv/depot"),
            Arc::new(CategoryTable::builtin()),
        )
    }

    #[test]
    fn test_resolve_precedence_all_combinations() {
        let resolver = resolver();
        let namespace: Namespace = "projects".parse().unwrap();
        // (explicit category, explicit namespace, classifiable input) -> expected dir
        let cases = [
            (true, true, true, "fonts"),
            (true, true, false, "fonts"),
            (true, false, true, "fonts"),
            (true, false, false, "fonts"),
            (false, true, true, "projects"),
            (false, true, false, "projects"),
            (false, false, true, "documents"),
            (false, false, false, "others"),
        ];
        for (has_category, has_namespace, classifiable, expected) in cases {
            let (mime, name) = if classifiable {
                (Some("application/pdf"), "a.pdf")
            } else {
                (Some("x/unknown"), "a.unknown")
            };
            let dest = resolver.resolve(
                has_category.then_some(Category::Fonts),
                has_namespace.then_some(&namespace),
                mime,
                name,
            );
            assert_eq!(dest.relative, expected);
            assert_eq!(dest.dir, Path::new("/srv/depot").join(expected));
            assert_eq!(dest.namespace().is_some(), !has_category && has_namespace);
        }
    }

    #[test]
    fn test_nested_namespace_destination() {
        let namespace: Namespace = "team/reports".parse().unwrap();
        let dest = resolver().resolve(None, Some(&namespace), None, "q3.xlsx");
        assert_eq!(dest.dir, Path::new("/srv/depot/team/reports"));
        assert_eq!(dest.relative, "team/reports");
    }

    #[test]
    fn test_namespace_validation() {
        assert!("a/b/c".parse::<Namespace>().is_err());
        assert!("..".parse::<Namespace>().is_err());
        assert!("temp".parse::<Namespace>().is_err());
        assert!("".parse::<Namespace>().is_err());
        assert!("a\\b".parse::<Namespace>().is_err());
        assert_eq!("/photos/".parse::<Namespace>().unwrap().as_str(), "photos");
    }

    #[test]
    fn test_resolve_relative_rejects_traversal() {
        let root = StorageRoot::new("/srv/depot");
        assert!(root.resolve_relative("../etc/passwd").is_err());
        assert!(root.resolve_relative("photos/../../x").is_err());
        assert!(root.resolve_relative("temp/upload.bin").is_err());
        assert!(root.resolve_relative("photos//x").is_err());
        assert_eq!(root.resolve_relative("").unwrap(), Path::new("/srv/depot"));
        assert_eq!(
            root.resolve_relative("/photos/cat.png").unwrap(),
            Path::new("/srv/depot/photos/cat.png")
        );
    }

    #[test]
    fn test_relative_display() {
        let root = StorageRoot::new("/srv/depot");
        assert_eq!(
            root.relative_display(Path::new("/srv/depot/a/b.txt")),
            "a/b.txt"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_filename("dir/"), "unnamed");
        assert_eq!(sanitize_filename(".."), "unnamed");
        assert_eq!(sanitize_filename("a\u{0}b.txt"), "ab.txt");
        assert_eq!(sanitize_filename("报告.pdf"), "报告.pdf");
    }

    #[test]
    fn test_sanitize_filename_caps_length() {
        let long = format!("{}.txt", "a".repeat(300));
        let capped = sanitize_filename(&long);
        assert_eq!(capped.len(), MAX_NAME_BYTES);
        assert!(capped.ends_with(".txt"));

        // Three-byte chars are never split
        let wide = format!("{}.pdf", "报".repeat(100));
        let capped = sanitize_filename(&wide);
        assert!(capped.len() <= MAX_NAME_BYTES);
        assert!(capped.ends_with(".pdf"));
        assert_eq!(capped.trim_end_matches(".pdf").chars().count(), 83);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
        assert_eq!(split_extension("README"), ("README", ""));
    }
}
