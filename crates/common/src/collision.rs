use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{IoContext, StoreError};
use crate::layout::{fit_name, split_extension};

/// Source of strictly increasing values used to derive alternative names.
pub trait Disambiguator: Send + Sync + std::fmt::Debug {
    fn next(&self) -> u64;
}

/// Wall-clock milliseconds, bumped past the last value handed out so that
/// rapid repeats within the same millisecond stay distinct.
#[derive(Debug, Default)]
pub struct MonotonicStamp {
    last: AtomicU64,
}

impl MonotonicStamp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Disambiguator for MonotonicStamp {
    fn next(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }
}

/// Plain counter starting at 1. Deterministic, handy in tests.
#[derive(Debug, Default)]
pub struct Counter {
    last: AtomicU64,
}

impl Disambiguator for Counter {
    fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// `base-<n><ext>`, keeping the last extension (dot included) at the end.
/// The base is shortened so the result still fits in one path component.
pub fn disambiguate(name: &str, n: u64) -> String {
    let (stem, ext) = split_extension(name);
    fit_name(stem, &format!("-{}{}", n, ext))
}

/// Pick a name that is currently free in `dir`.
///
/// This only looks; it does not claim the name. Two callers can get the same
/// answer, so anything that writes must claim exclusively (see
/// [`crate::finalize::Finalizer`]).
pub async fn reserve(
    dir: &Path,
    desired: &str,
    disambiguator: &dyn Disambiguator,
) -> Result<String, StoreError> {
    let mut candidate = desired.to_string();
    while tokio::fs::try_exists(dir.join(&candidate))
        .await
        .op("check existing name")?
    {
        candidate = disambiguate(desired, disambiguator.next());
    }
    Ok(candidate)
}
