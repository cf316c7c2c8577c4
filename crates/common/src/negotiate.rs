use std::collections::HashSet;
use std::fmt;

/// Stored files are immutable once committed; a re-upload gets a new name.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const PREVIEWABLE: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".bmp", ".ico", ".avif", ".pdf", ".mp3",
    ".wav", ".ogg", ".m4a", ".aac", ".flac", ".mp4", ".webm", ".ogv", ".mov",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }

    /// Full `Content-Disposition` value for `filename`.
    ///
    /// Carries an ASCII fallback plus an RFC 5987 `filename*` parameter so
    /// non-ASCII names survive.
    pub fn header_value(&self, filename: &str) -> String {
        let fallback: String = filename
            .chars()
            .map(|c| {
                if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            self.as_str(),
            fallback,
            urlencoding::encode(filename)
        )
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedHeaders {
    pub content_type: String,
    pub disposition: Disposition,
    pub cache_control: &'static str,
}

impl NegotiatedHeaders {
    /// `Content-Disposition` value for serving `filename` with these headers.
    pub fn content_disposition(&self, filename: &str) -> String {
        self.disposition.header_value(filename)
    }
}

/// Decides how a stored file is presented when served.
#[derive(Debug, Clone)]
pub struct ContentNegotiator {
    previewable: HashSet<&'static str>,
}

impl Default for ContentNegotiator {
    fn default() -> Self {
        Self {
            previewable: PREVIEWABLE.iter().copied().collect(),
        }
    }
}

impl ContentNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `extension` is lowercased and includes the leading dot, or is `None`
    /// for names without one.
    pub fn headers(&self, extension: Option<&str>, download: bool) -> NegotiatedHeaders {
        let content_type = extension
            .and_then(|ext| mime_guess::from_ext(ext.trim_start_matches('.')).first_raw())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let previewable = extension.is_some_and(|ext| self.previewable.contains(ext));
        let disposition = if download || !previewable {
            Disposition::Attachment
        } else {
            Disposition::Inline
        };
        NegotiatedHeaders {
            content_type,
            disposition,
            cache_control: IMMUTABLE_CACHE_CONTROL,
        }
    }
}
