//! Content categories and the lookup tables that assign them.
//!
//! Classification is priority ordered: the declared MIME type is consulted
//! first, then the filename extension, and anything left over lands in
//! [`Category::Others`]. The two tables are maintained independently and can
//! disagree for the same file; that is expected.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Images,
    Videos,
    Audios,
    Codes,
    Documents,
    Archives,
    Fonts,
    Others,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Images,
        Category::Videos,
        Category::Audios,
        Category::Codes,
        Category::Documents,
        Category::Archives,
        Category::Fonts,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Videos => "videos",
            Category::Audios => "audios",
            Category::Codes => "codes",
            Category::Documents => "documents",
            Category::Archives => "archives",
            Category::Fonts => "fonts",
            Category::Others => "others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("unknown category '{}'", s)))
    }
}

const MIME_TYPES: &[(Category, &[&str])] = &[
    (
        Category::Images,
        &[
            "image/jpeg",
            "image/png",
            "image/gif",
            "image/webp",
            "image/svg+xml",
            "image/bmp",
            "image/tiff",
            "image/x-icon",
            "image/vnd.microsoft.icon",
            "image/avif",
            "image/heic",
        ],
    ),
    (
        Category::Videos,
        &[
            "video/mp4",
            "video/mpeg",
            "video/quicktime",
            "video/x-msvideo",
            "video/x-matroska",
            "video/webm",
            "video/ogg",
            "video/3gpp",
            "video/x-flv",
        ],
    ),
    (
        Category::Audios,
        &[
            "audio/mpeg",
            "audio/wav",
            "audio/x-wav",
            "audio/ogg",
            "audio/aac",
            "audio/flac",
            "audio/x-flac",
            "audio/webm",
            "audio/mp4",
            "audio/x-m4a",
            "audio/midi",
        ],
    ),
    (
        Category::Codes,
        &[
            "text/javascript",
            "application/javascript",
            "application/json",
            "text/html",
            "text/css",
            "application/xml",
            "text/xml",
            "text/x-python",
            "text/x-c",
            "text/x-java-source",
            "text/x-rust",
            "text/x-go",
            "application/typescript",
            "application/x-sh",
            "application/x-httpd-php",
            "application/sql",
        ],
    ),
    (
        Category::Documents,
        &[
            "application/pdf",
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/vnd.ms-excel",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/vnd.oasis.opendocument.text",
            "application/vnd.oasis.opendocument.spreadsheet",
            "application/rtf",
            "application/epub+zip",
            "text/plain",
            "text/markdown",
            "text/csv",
        ],
    ),
    (
        Category::Archives,
        &[
            "application/zip",
            "application/x-zip-compressed",
            "application/vnd.rar",
            "application/x-rar-compressed",
            "application/x-7z-compressed",
            "application/x-tar",
            "application/gzip",
            "application/x-gzip",
            "application/x-bzip2",
            "application/x-xz",
        ],
    ),
    (
        Category::Fonts,
        &[
            "font/ttf",
            "font/otf",
            "font/woff",
            "font/woff2",
            "application/font-woff",
            "application/x-font-ttf",
            "application/vnd.ms-fontobject",
        ],
    ),
];

const EXTENSIONS: &[(&str, Category)] = &[
    (".jpg", Category::Images),
    (".jpeg", Category::Images),
    (".png", Category::Images),
    (".gif", Category::Images),
    (".webp", Category::Images),
    (".svg", Category::Images),
    (".bmp", Category::Images),
    (".tif", Category::Images),
    (".tiff", Category::Images),
    (".ico", Category::Images),
    (".avif", Category::Images),
    (".heic", Category::Images),
    (".mp4", Category::Videos),
    (".mpeg", Category::Videos),
    (".mov", Category::Videos),
    (".avi", Category::Videos),
    (".mkv", Category::Videos),
    (".webm", Category::Videos),
    (".ogv", Category::Videos),
    (".3gp", Category::Videos),
    (".flv", Category::Videos),
    (".mp3", Category::Audios),
    (".wav", Category::Audios),
    (".ogg", Category::Audios),
    (".oga", Category::Audios),
    (".aac", Category::Audios),
    (".flac", Category::Audios),
    (".m4a", Category::Audios),
    (".mid", Category::Audios),
    (".midi", Category::Audios),
    (".js", Category::Codes),
    (".mjs", Category::Codes),
    (".ts", Category::Codes),
    (".tsx", Category::Codes),
    (".jsx", Category::Codes),
    (".json", Category::Codes),
    (".html", Category::Codes),
    (".htm", Category::Codes),
    (".css", Category::Codes),
    (".xml", Category::Codes),
    (".py", Category::Codes),
    (".rs", Category::Codes),
    (".go", Category::Codes),
    (".java", Category::Codes),
    (".c", Category::Codes),
    (".h", Category::Codes),
    (".cpp", Category::Codes),
    (".hpp", Category::Codes),
    (".cs", Category::Codes),
    (".rb", Category::Codes),
    (".php", Category::Codes),
    (".sh", Category::Codes),
    (".sql", Category::Codes),
    (".yaml", Category::Codes),
    (".yml", Category::Codes),
    (".toml", Category::Codes),
    (".pdf", Category::Documents),
    (".doc", Category::Documents),
    (".docx", Category::Documents),
    (".xls", Category::Documents),
    (".xlsx", Category::Documents),
    (".ppt", Category::Documents),
    (".pptx", Category::Documents),
    (".odt", Category::Documents),
    (".ods", Category::Documents),
    (".rtf", Category::Documents),
    (".epub", Category::Documents),
    (".txt", Category::Documents),
    (".md", Category::Documents),
    (".csv", Category::Documents),
    (".zip", Category::Archives),
    (".rar", Category::Archives),
    (".7z", Category::Archives),
    (".tar", Category::Archives),
    (".gz", Category::Archives),
    (".tgz", Category::Archives),
    (".bz2", Category::Archives),
    (".xz", Category::Archives),
    (".ttf", Category::Fonts),
    (".otf", Category::Fonts),
    (".woff", Category::Fonts),
    (".woff2", Category::Fonts),
    (".eot", Category::Fonts),
];

/// A key that appears more than once in a category table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMapping {
    pub key: String,
    /// The mapping used for lookups.
    pub kept: Category,
    pub ignored: Category,
}

/// Immutable MIME-type and extension lookup tables.
///
/// Built once and shared by reference; lookups need no synchronization.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    by_mime: HashMap<String, Category>,
    by_extension: HashMap<String, Category>,
    duplicates: Vec<DuplicateMapping>,
}

impl CategoryTable {
    pub fn builtin() -> Self {
        Self::from_entries(
            MIME_TYPES
                .iter()
                .flat_map(|(category, mimes)| mimes.iter().map(move |m| (*m, *category))),
            EXTENSIONS.iter().copied(),
        )
    }

    /// Build a table from `(mime, category)` and `(".ext", category)` pairs.
    ///
    /// When a key repeats, the first mapping wins and the repeat is recorded
    /// in [`CategoryTable::duplicates`].
    pub fn from_entries<'a, M, E>(mimes: M, extensions: E) -> Self
    where
        M: IntoIterator<Item = (&'a str, Category)>,
        E: IntoIterator<Item = (&'a str, Category)>,
    {
        let mut duplicates = Vec::new();
        let by_mime = insert_all(mimes, normalize_mime, &mut duplicates);
        let by_extension = insert_all(extensions, |e| e.to_ascii_lowercase(), &mut duplicates);
        Self {
            by_mime,
            by_extension,
            duplicates,
        }
    }

    pub fn duplicates(&self) -> &[DuplicateMapping] {
        &self.duplicates
    }

    /// Classify by MIME type first, then by extension, else `Others`.
    pub fn classify(&self, mime_type: Option<&str>, filename: &str) -> Category {
        if let Some(category) = mime_type.and_then(|m| self.by_mime.get(&normalize_mime(m))) {
            return *category;
        }
        extension_of(filename)
            .and_then(|ext| self.by_extension.get(&ext))
            .copied()
            .unwrap_or(Category::Others)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn insert_all<'a, I>(
    entries: I,
    normalize: impl Fn(&str) -> String,
    duplicates: &mut Vec<DuplicateMapping>,
) -> HashMap<String, Category>
where
    I: IntoIterator<Item = (&'a str, Category)>,
{
    let mut map = HashMap::new();
    for (key, category) in entries {
        let key = normalize(key);
        match map.get(&key) {
            Some(kept) => duplicates.push(DuplicateMapping {
                key,
                kept: *kept,
                ignored: category,
            }),
            None => {
                map.insert(key, category);
            }
        }
    }
    map
}

/// Lowercase the essence of a MIME type, dropping any parameters.
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Lowercased extension of `filename` including the leading dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
}
