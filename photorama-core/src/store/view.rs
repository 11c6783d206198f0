//! Isolated in-memory views over the persisted entities.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use crate::{CacheKey, NewPhoto, Photo, PhotoId, PhotoQuery, Tag, TagId, TagQuery};

use super::{ChangeBatch, EntityBackend, Snapshot, StoreError};

/// Role of a view within an [`EntityStore`](super::EntityStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Background view that receives decoded photos.
    Write,
    /// Foreground view backing queries and user edits.
    Read,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Read => "read",
        })
    }
}

/// Entities visible to a view, in insertion order.
#[derive(Debug, Default, Clone)]
struct WorkingSet {
    photos: Vec<Photo>,
    by_key: HashMap<CacheKey, usize>,
    by_photo_id: HashMap<PhotoId, usize>,
    tags: Vec<Tag>,
    tags_by_id: HashMap<TagId, usize>,
}

impl WorkingSet {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut set = Self::default();
        for photo in snapshot.photos {
            set.push_photo(photo);
        }
        for tag in snapshot.tags {
            set.push_tag(tag);
        }
        set
    }

    fn push_photo(&mut self, photo: Photo) {
        let index = self.photos.len();
        self.by_key.insert(photo.cache_key, index);
        self.by_photo_id.insert(photo.photo_id.clone(), index);
        self.photos.push(photo);
    }

    fn push_tag(&mut self, tag: Tag) {
        self.tags_by_id.insert(tag.tag_id, self.tags.len());
        self.tags.push(tag);
    }

    fn photo(&self, key: &CacheKey) -> Option<&Photo> {
        self.by_key.get(key).and_then(|index| self.photos.get(*index))
    }

    fn photo_mut(&mut self, key: &CacheKey) -> Option<&mut Photo> {
        let index = *self.by_key.get(key)?;
        self.photos.get_mut(index)
    }

    fn photo_by_id(&self, id: &PhotoId) -> Option<&Photo> {
        self.by_photo_id
            .get(id)
            .and_then(|index| self.photos.get(*index))
    }

    fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags_by_id.get(id).and_then(|index| self.tags.get(*index))
    }
}

/// Working set plus the changes not yet committed.
#[derive(Debug, Default)]
struct ViewState {
    working: WorkingSet,
    inserted_photos: Vec<CacheKey>,
    updated_photos: HashSet<CacheKey>,
    inserted_tags: Vec<TagId>,
}

impl ViewState {
    fn has_pending(&self) -> bool {
        !(self.inserted_photos.is_empty()
            && self.updated_photos.is_empty()
            && self.inserted_tags.is_empty())
    }

    fn pending_batch(&self, origin: ViewKind) -> ChangeBatch {
        let mut updated: Vec<CacheKey> = self.updated_photos.iter().copied().collect();
        updated.sort_by_key(|key| self.working.by_key.get(key).copied());
        ChangeBatch {
            origin,
            inserted_photos: self.cloned_photos(&self.inserted_photos),
            updated_photos: self.cloned_photos(&updated),
            inserted_tags: self
                .inserted_tags
                .iter()
                .filter_map(|id| self.working.tag(id).cloned())
                .collect(),
        }
    }

    fn cloned_photos(&self, keys: &[CacheKey]) -> Vec<Photo> {
        keys.iter()
            .filter_map(|key| self.working.photo(key).cloned())
            .collect()
    }

    fn clear_pending(&mut self) {
        self.inserted_photos.clear();
        self.updated_photos.clear();
        self.inserted_tags.clear();
    }
}

/// An isolated working copy of the store.
///
/// Changes made through a view are visible to that view immediately and to
/// nothing else until [`StoreView::commit`] succeeds. Every method locks the
/// view for its whole duration, so concurrent callers observe each operation
/// atomically.
pub struct StoreView {
    kind: ViewKind,
    backend: Arc<dyn EntityBackend>,
    state: Mutex<ViewState>,
}

impl fmt::Debug for StoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StoreView")
            .field("kind", &self.kind)
            .field("photos", &state.working.photos.len())
            .field("tags", &state.working.tags.len())
            .field("pending", &state.has_pending())
            .finish_non_exhaustive()
    }
}

impl StoreView {
    pub(super) fn open(kind: ViewKind, backend: Arc<dyn EntityBackend>) -> Result<Self, StoreError> {
        let snapshot = backend.load()?;
        Ok(Self {
            kind,
            backend,
            state: Mutex::new(ViewState {
                working: WorkingSet::from_snapshot(snapshot),
                ..ViewState::default()
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        // Mutations never panic half-way, so a poisoned state is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Role of this view.
    #[must_use]
    pub const fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Whether the view holds uncommitted changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lock().has_pending()
    }

    /// Number of photos visible to the view.
    #[must_use]
    pub fn photo_count(&self) -> usize {
        self.lock().working.photos.len()
    }

    /// Insert a new photo under a freshly generated cache key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConstraintViolation`] when a photo with the same
    /// service identifier is already visible to the view.
    pub fn insert_photo(&self, new: NewPhoto) -> Result<Photo, StoreError> {
        let mut state = self.lock();
        if state.working.photo_by_id(&new.photo_id).is_some() {
            return Err(StoreError::ConstraintViolation {
                operation: "insert photo",
                message: format!("photo {} already exists", new.photo_id),
            });
        }
        Ok(Self::insert_locked(&mut state, new))
    }

    /// Return the photo with `new.photo_id`, inserting `new` when absent.
    ///
    /// The lookup and the insert happen under one lock. The boolean is `true`
    /// when a photo was inserted. An existing photo is returned untouched.
    pub fn find_or_insert_photo(&self, new: NewPhoto) -> (Photo, bool) {
        let mut state = self.lock();
        if let Some(existing) = state.working.photo_by_id(&new.photo_id) {
            return (existing.clone(), false);
        }
        (Self::insert_locked(&mut state, new), true)
    }

    fn insert_locked(state: &mut ViewState, new: NewPhoto) -> Photo {
        let photo = Photo::from_new(new, CacheKey::generate());
        state.inserted_photos.push(photo.cache_key);
        state.working.push_photo(photo.clone());
        photo
    }

    /// Create a tag named `name`, trimmed of surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConstraintViolation`] for a blank name.
    pub fn insert_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::ConstraintViolation {
                operation: "insert tag",
                message: "tag name must not be blank".into(),
            });
        }
        let tag = Tag {
            tag_id: TagId::generate(),
            name: trimmed.to_owned(),
        };
        let mut state = self.lock();
        state.inserted_tags.push(tag.tag_id);
        state.working.push_tag(tag.clone());
        Ok(tag)
    }

    /// Photos matching `query`.
    #[must_use]
    pub fn query_photos(&self, query: &PhotoQuery) -> Vec<Photo> {
        query.apply(&self.lock().working.photos)
    }

    /// Tags matching `query`.
    #[must_use]
    pub fn query_tags(&self, query: &TagQuery) -> Vec<Tag> {
        query.apply(&self.lock().working.tags)
    }

    /// Photo carrying the service identifier `id`.
    #[must_use]
    pub fn photo_by_id(&self, id: &PhotoId) -> Option<Photo> {
        self.lock().working.photo_by_id(id).cloned()
    }

    /// Photo stored under `key`.
    #[must_use]
    pub fn photo(&self, key: &CacheKey) -> Option<Photo> {
        self.lock().working.photo(key).cloned()
    }

    /// Tag with identity `id`.
    #[must_use]
    pub fn tag(&self, id: &TagId) -> Option<Tag> {
        self.lock().working.tag(id).cloned()
    }

    /// Mutate the user state of the photo under `key`.
    ///
    /// Identity fields are restored after `mutate` runs, so only the view
    /// count, favourite flag and tag set can change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the photo is not visible, or
    /// when `mutate` attaches a tag the view does not know.
    pub fn update_photo<F>(&self, key: &CacheKey, mutate: F) -> Result<Photo, StoreError>
    where
        F: FnOnce(&mut Photo),
    {
        let mut state = self.lock();
        let current = state
            .working
            .photo(key)
            .cloned()
            .ok_or_else(|| not_found_photo(key))?;
        let mut edited = current.clone();
        mutate(&mut edited);
        if let Some(unknown) = edited.tags.iter().find(|id| state.working.tag(id).is_none()) {
            return Err(StoreError::NotFound {
                entity: "tag",
                key: unknown.to_string(),
            });
        }
        edited.photo_id = current.photo_id;
        edited.title = current.title;
        edited.remote_url = current.remote_url;
        edited.date_taken = current.date_taken;
        edited.cache_key = current.cache_key;
        let slot = state
            .working
            .photo_mut(key)
            .ok_or_else(|| not_found_photo(key))?;
        *slot = edited.clone();
        if !state.inserted_photos.contains(key) {
            state.updated_photos.insert(*key);
        }
        Ok(edited)
    }

    /// Count one view of the photo under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the photo is not visible.
    pub fn record_view(&self, key: &CacheKey) -> Result<Photo, StoreError> {
        self.update_photo(key, |photo| {
            photo.record_view();
        })
    }

    /// Set the favourite flag of the photo under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the photo is not visible.
    pub fn set_favorite(&self, key: &CacheKey, favorite: bool) -> Result<Photo, StoreError> {
        self.update_photo(key, |photo| photo.is_favorite = favorite)
    }

    /// Flip the favourite flag of the photo under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the photo is not visible.
    pub fn toggle_favorite(&self, key: &CacheKey) -> Result<Photo, StoreError> {
        self.update_photo(key, |photo| {
            photo.toggle_favorite();
        })
    }

    /// Attach `tag` to the photo under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when either entity is not visible.
    pub fn add_tag_to_photo(&self, key: &CacheKey, tag: &TagId) -> Result<Photo, StoreError> {
        self.update_photo(key, |photo| {
            photo.add_tag(*tag);
        })
    }

    /// Detach `tag` from the photo under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the photo is not visible.
    pub fn remove_tag_from_photo(&self, key: &CacheKey, tag: &TagId) -> Result<Photo, StoreError> {
        self.update_photo(key, |photo| {
            photo.remove_tag(tag);
        })
    }

    /// Persist every pending change of this view in one transaction.
    ///
    /// On failure the pending changes stay in place so the caller may retry.
    /// After a successful commit the read view reloads its working set so it
    /// also sees what other views committed.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure. A reload failure after a successful
    /// write is also reported; the data is durable in that case.
    pub fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.has_pending() {
            let batch = state.pending_batch(self.kind);
            self.backend.apply(&batch)?;
            debug!(
                "committed {} view: {} new photos, {} updated photos, {} new tags",
                self.kind,
                batch.inserted_photos.len(),
                batch.updated_photos.len(),
                batch.inserted_tags.len()
            );
            state.clear_pending();
        }
        if self.kind == ViewKind::Read {
            state.working = WorkingSet::from_snapshot(self.backend.load()?);
        }
        Ok(())
    }

    /// Reload the working set from storage unless changes are pending.
    ///
    /// Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state.has_pending() {
            return Ok(false);
        }
        state.working = WorkingSet::from_snapshot(self.backend.load()?);
        Ok(true)
    }
}

fn not_found_photo(key: &CacheKey) -> StoreError {
    StoreError::NotFound {
        entity: "photo",
        key: key.to_string(),
    }
}
