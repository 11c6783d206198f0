//! Volatile backend holding committed entities in process memory.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use super::{ChangeBatch, EntityBackend, Snapshot, StoreError};

/// Backend that keeps the committed snapshot in memory.
///
/// It enforces the same constraints as the SQLite backend: unique photo
/// identifiers and cache keys, and tag sets that reference known tags.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: Mutex<Snapshot>,
}

impl MemoryBackend {
    /// Start from an existing snapshot.
    #[must_use]
    pub const fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            committed: Mutex::new(snapshot),
        }
    }
}

impl EntityBackend for MemoryBackend {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn apply(&self, batch: &ChangeBatch) -> Result<(), StoreError> {
        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = committed.clone();
        next.tags.extend(batch.inserted_tags.iter().cloned());

        let mut ids = HashSet::new();
        let mut keys = HashSet::new();
        for photo in next.photos.iter().chain(&batch.inserted_photos) {
            if !ids.insert(&photo.photo_id) || !keys.insert(photo.cache_key) {
                return Err(StoreError::ConstraintViolation {
                    operation: "insert photo",
                    message: format!("photo {} already exists", photo.photo_id),
                });
            }
        }
        next.photos.extend(batch.inserted_photos.iter().cloned());

        for update in &batch.updated_photos {
            let slot = next
                .photos
                .iter_mut()
                .find(|photo| photo.cache_key == update.cache_key)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "photo",
                    key: update.cache_key.to_string(),
                })?;
            slot.view_count = update.view_count;
            slot.is_favorite = update.is_favorite;
            slot.tags.clone_from(&update.tags);
        }

        let known: HashSet<_> = next.tags.iter().map(|tag| tag.tag_id).collect();
        if let Some(dangling) = next
            .photos
            .iter()
            .flat_map(|photo| photo.tags.iter())
            .find(|id| !known.contains(id))
        {
            return Err(StoreError::ConstraintViolation {
                operation: "link tag",
                message: format!("tag {dangling} does not exist"),
            });
        }

        *committed = next;
        Ok(())
    }
}
