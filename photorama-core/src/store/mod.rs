//! Persistent entity store with isolated read and write views.
//!
//! An [`EntityStore`] owns two [`StoreView`]s over one [`EntityBackend`]:
//!
//! - the write view receives photos decoded by background ingestion;
//! - the read view serves queries and user edits.
//!
//! Neither view sees the other's uncommitted changes. Each commit is applied
//! by the backend as a single transaction, and the read view reloads after
//! every successful commit so it observes the write view's committed inserts.

use std::{fmt, sync::Arc};

use crate::{Photo, Tag};

mod error;
mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;
mod view;

#[cfg(test)]
mod tests;

pub use error::{BoxedSource, StoreError};
pub use memory::MemoryBackend;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteBackend;
pub use view::{StoreView, ViewKind};

/// Every persisted entity, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Persisted photos with their tag sets.
    pub photos: Vec<Photo>,
    /// Persisted tags.
    pub tags: Vec<Tag>,
}

/// Changes committed by one view.
///
/// Photos carry their complete state. Backends write identity fields only
/// for inserted photos and replace the user state and tag set of both kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// View that produced the batch.
    pub origin: ViewKind,
    /// Photos created since the last commit.
    pub inserted_photos: Vec<Photo>,
    /// Previously persisted photos whose user state changed.
    pub updated_photos: Vec<Photo>,
    /// Tags created since the last commit.
    pub inserted_tags: Vec<Tag>,
}

impl ChangeBatch {
    /// Whether the batch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted_photos.is_empty()
            && self.updated_photos.is_empty()
            && self.inserted_tags.is_empty()
    }
}

/// Durable storage behind the views.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use photorama_core::{EntityStore, MemoryBackend, PhotoQuery};
///
/// # fn main() -> Result<(), photorama_core::StoreError> {
/// let store = EntityStore::new(Arc::new(MemoryBackend::default()))?;
/// assert!(store.read_view().query_photos(&PhotoQuery::all()).is_empty());
/// # Ok(())
/// # }
/// ```
pub trait EntityBackend: Send + Sync + fmt::Debug {
    /// Read every persisted entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when storage cannot be read and
    /// [`StoreError::Corrupt`] when a row cannot be decoded.
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Apply `batch` atomically: either every change lands or none does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConstraintViolation`] when the batch conflicts
    /// with persisted data and [`StoreError::Io`] when storage fails.
    fn apply(&self, batch: &ChangeBatch) -> Result<(), StoreError>;
}

/// Entity store exposing one write view and one read view.
#[derive(Debug)]
pub struct EntityStore {
    write: StoreView,
    read: StoreView,
}

impl EntityStore {
    /// Open both views over `backend`.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the initial load.
    pub fn new(backend: Arc<dyn EntityBackend>) -> Result<Self, StoreError> {
        Ok(Self {
            write: StoreView::open(ViewKind::Write, Arc::clone(&backend))?,
            read: StoreView::open(ViewKind::Read, backend)?,
        })
    }

    /// Open a store persisted in the SQLite database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the database cannot be opened or
    /// migrated.
    #[cfg(feature = "store-sqlite")]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        Self::new(Arc::new(SqliteBackend::open(path)?))
    }

    /// Open a store backed by a private in-memory SQLite database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when SQLite cannot be initialised.
    #[cfg(feature = "store-sqlite")]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(Arc::new(SqliteBackend::open_in_memory()?))
    }

    /// View used by background ingestion.
    #[must_use]
    pub const fn write_view(&self) -> &StoreView {
        &self.write
    }

    /// View used for queries and user edits.
    #[must_use]
    pub const fn read_view(&self) -> &StoreView {
        &self.read
    }

    /// Commit the write view, then the read view.
    ///
    /// The commits are independent. When the read view fails, the write
    /// view's changes stay committed.
    ///
    /// # Errors
    ///
    /// Returns the first commit failure.
    pub fn save_changes(&self) -> Result<(), StoreError> {
        self.write.commit()?;
        self.read.commit()
    }
}
