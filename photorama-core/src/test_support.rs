//! Fixtures and fault-injecting backends for unit and behaviour tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use chrono::NaiveDateTime;
use url::Url;

use crate::{
    ChangeBatch, DATE_TAKEN_FORMAT, EntityBackend, MemoryBackend, NewPhoto, PhotoId, Snapshot,
    StoreError, ViewKind,
};

/// Build a decoded photo with a deterministic URL and title.
///
/// # Panics
///
/// Panics when `date_taken` does not follow [`DATE_TAKEN_FORMAT`].
#[must_use]
#[expect(clippy::expect_used, reason = "fixtures fail fast on bad input")]
pub fn new_photo(photo_id: &str, date_taken: &str) -> NewPhoto {
    NewPhoto {
        photo_id: PhotoId::new(photo_id),
        title: format!("Photo {photo_id}"),
        remote_url: Url::parse(&format!("https://live.staticflickr.com/{photo_id}_h.jpg"))
            .expect("fixture URL is valid"),
        date_taken: NaiveDateTime::parse_from_str(date_taken, DATE_TAKEN_FORMAT)
            .expect("fixture date follows DATE_TAKEN_FORMAT"),
    }
}

/// Backend wrapper that fails commits from selected views on demand.
///
/// Loads always pass through to the wrapped backend.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: Arc<dyn EntityBackend>,
    fail_write: AtomicBool,
    fail_read: AtomicBool,
    applied: AtomicUsize,
}

impl Default for FaultyBackend {
    fn default() -> Self {
        Self::wrapping(Arc::new(MemoryBackend::default()))
    }
}

impl FaultyBackend {
    /// Wrap `inner`, initially failing nothing.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn EntityBackend>) -> Self {
        Self {
            inner,
            fail_write: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            applied: AtomicUsize::new(0),
        }
    }

    /// Make commits from the view of `kind` fail or succeed.
    pub fn fail_commits_from(&self, kind: ViewKind, fail: bool) {
        match kind {
            ViewKind::Write => self.fail_write.store(fail, Ordering::SeqCst),
            ViewKind::Read => self.fail_read.store(fail, Ordering::SeqCst),
        }
    }

    /// Number of batches that reached the wrapped backend.
    #[must_use]
    pub fn applied_batches(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

impl EntityBackend for FaultyBackend {
    fn load(&self) -> Result<Snapshot, StoreError> {
        self.inner.load()
    }

    fn apply(&self, batch: &ChangeBatch) -> Result<(), StoreError> {
        let failing = match batch.origin {
            ViewKind::Write => &self.fail_write,
            ViewKind::Read => &self.fail_read,
        };
        if failing.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                "commit changes",
                std::io::Error::other(format!("injected {} view failure", batch.origin)),
            ));
        }
        self.inner.apply(batch)?;
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
