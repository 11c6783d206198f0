//! Photo ingestion and cache synchronisation.
//!
//! [`PhotoService`] fetches photo listings, decodes them against the store's
//! write view on a blocking worker, saves both views and re-queries the read
//! view for the caller. It also serves images through the two-tier cache and
//! exposes the user operations backed by the read view.
//!
//! Async methods run on the caller's task; only decoding, saving, cache disk
//! access and image decoding move to Tokio's blocking pool.

use std::{fmt, sync::Arc};

use log::{debug, info};
use photorama_core::{
    CacheKey, EntityStore, Photo, PhotoField, PhotoPredicate, PhotoQuery, PhotoSortKey, StoreError,
    Tag, TagId, TagQuery,
};
use url::Url;

use crate::{
    cache::{CachedImage, ImageCache},
    flickr::{ApiMethod, FlickrApi, decode_photos},
    transport::Transport,
};

mod error;

pub use error::{FetchPhotosError, ImageFetchError};

/// Progress of a photo listing fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Not started.
    Idle,
    /// Waiting for the listing download.
    Requesting,
    /// Decoding records against the write view.
    Decoding,
    /// Committing the write view, then the read view.
    Persisting,
    /// Re-querying the read view.
    Resolving,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Decoding => "decoding",
            Self::Persisting => "persisting",
            Self::Resolving => "resolving",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

fn enter(method: ApiMethod, stage: FetchStage) {
    debug!("{method} fetch: {stage}");
}

/// Coordinates the remote API, the entity store and the image cache.
pub struct PhotoService<T> {
    api: FlickrApi,
    transport: T,
    store: Arc<EntityStore>,
    images: Arc<ImageCache>,
}

impl<T> fmt::Debug for PhotoService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoService")
            .field("api", &self.api)
            .field("store", &self.store)
            .field("images", &self.images)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PhotoService<T> {
    /// Assemble a service from its collaborators.
    pub const fn new(
        api: FlickrApi,
        transport: T,
        store: Arc<EntityStore>,
        images: Arc<ImageCache>,
    ) -> Self {
        Self {
            api,
            transport,
            store,
            images,
        }
    }

    /// Entity store shared with the service.
    #[must_use]
    pub const fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Image cache shared with the service.
    #[must_use]
    pub const fn images(&self) -> &Arc<ImageCache> {
        &self.images
    }

    /// Transport used for every request.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch a listing and return every stored photo, oldest first.
    ///
    /// # Errors
    ///
    /// See [`PhotoService::fetch_photos_matching`].
    pub async fn fetch_photos(
        &self,
        method: ApiMethod,
        keyword: Option<&str>,
    ) -> Result<Vec<Photo>, FetchPhotosError> {
        self.fetch_photos_matching(method, keyword, &PhotoQuery::by_date_taken())
            .await
    }

    /// Fetch a listing, store unseen photos, then return the read view's
    /// answer to `query`.
    ///
    /// The result reflects the whole store, not only the fetched batch.
    ///
    /// # Errors
    ///
    /// Returns [`FetchPhotosError::MissingKeyword`] for a search without a
    /// non-blank keyword, and otherwise the error of the failing stage. The
    /// read view is not re-queried after a failure.
    pub async fn fetch_photos_matching(
        &self,
        method: ApiMethod,
        keyword: Option<&str>,
        query: &PhotoQuery,
    ) -> Result<Vec<Photo>, FetchPhotosError> {
        if let Err(err) = self.ingest(method, keyword).await {
            enter(method, FetchStage::Failed);
            debug!("{method} fetch failed while {}: {err}", err.stage());
            return Err(err);
        }
        enter(method, FetchStage::Resolving);
        let photos = self.store.read_view().query_photos(query);
        enter(method, FetchStage::Complete);
        Ok(photos)
    }

    async fn ingest(&self, method: ApiMethod, keyword: Option<&str>) -> Result<(), FetchPhotosError> {
        let url = self.listing_url(method, keyword)?;
        enter(method, FetchStage::Requesting);
        let body = self
            .transport
            .get(&url)
            .await
            .map_err(|source| FetchPhotosError::Transport { source })?;

        enter(method, FetchStage::Decoding);
        let store = Arc::clone(&self.store);
        let batch = tokio::task::spawn_blocking(move || -> Result<usize, FetchPhotosError> {
            let photos = decode_photos(&body, store.write_view())
                .map_err(|source| FetchPhotosError::Decode { source })?;
            enter(method, FetchStage::Persisting);
            store
                .save_changes()
                .map_err(|source| FetchPhotosError::Store { source })?;
            Ok(photos.len())
        })
        .await
        .map_err(|source| FetchPhotosError::Background { source })??;
        info!("{method} fetch stored a batch of {batch} photos");
        Ok(())
    }

    fn listing_url(&self, method: ApiMethod, keyword: Option<&str>) -> Result<Url, FetchPhotosError> {
        match method {
            ApiMethod::RecentPhotos => Ok(self.api.recent_photos_url()),
            ApiMethod::Search => keyword
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| self.api.search_photos_url(text))
                .ok_or(FetchPhotosError::MissingKeyword),
        }
    }

    /// Image for `photo`, from the cache or else downloaded and cached.
    ///
    /// A cache hit never touches the network. Callers showing the image in a
    /// reusable slot should check the slot still shows `photo` before using
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`ImageFetchError::Transport`] when the download fails and
    /// [`ImageFetchError::ImageDecode`] when the bytes are not an image.
    pub async fn fetch_image(&self, photo: &Photo) -> Result<CachedImage, ImageFetchError> {
        let key = photo.cache_key;
        let images = Arc::clone(&self.images);
        let cached = tokio::task::spawn_blocking(move || images.get(&key))
            .await
            .map_err(|source| ImageFetchError::Background { source })?;
        if let Some(image) = cached {
            debug!("image {key}: cache hit");
            return Ok(image);
        }

        debug!("image {key}: downloading {}", photo.remote_url);
        let bytes = self
            .transport
            .get(&photo.remote_url)
            .await
            .map_err(|source| ImageFetchError::Transport {
                cache_key: key,
                source,
            })?;
        let images = Arc::clone(&self.images);
        tokio::task::spawn_blocking(move || -> Result<CachedImage, ImageFetchError> {
            let decoded = image::load_from_memory(&bytes).map_err(|source| {
                ImageFetchError::ImageDecode {
                    cache_key: key,
                    source,
                }
            })?;
            let image = Arc::new(decoded);
            images.put(Arc::clone(&image), &key);
            Ok(image)
        })
        .await
        .map_err(|source| ImageFetchError::Background { source })?
    }

    /// Drop the cached image of `photo` from both tiers.
    pub fn evict_image(&self, photo: &Photo) {
        self.images.remove(&photo.cache_key);
    }

    /// Stored photos matching `query`.
    #[must_use]
    pub fn photos(&self, query: &PhotoQuery) -> Vec<Photo> {
        self.store.read_view().query_photos(query)
    }

    /// Favourite photos, oldest first.
    #[must_use]
    pub fn favorite_photos(&self) -> Vec<Photo> {
        self.photos(
            &PhotoQuery::all()
                .with_predicate(PhotoPredicate::IsFavorite(true))
                .sorted_by(PhotoSortKey::ascending(PhotoField::DateTaken)),
        )
    }

    /// Every tag, ordered by name.
    #[must_use]
    pub fn fetch_tags(&self) -> Vec<Tag> {
        self.store.read_view().query_tags(&TagQuery::by_name())
    }

    /// Create and save a tag.
    ///
    /// # Errors
    ///
    /// Returns the store error when the name is blank or the save fails.
    pub fn create_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let tag = self.store.read_view().insert_tag(name)?;
        self.save_read_view()?;
        Ok(tag)
    }

    /// Attach `tag` to the photo under `key` and save.
    ///
    /// # Errors
    ///
    /// Returns the store error when either entity is unknown or the save
    /// fails.
    pub fn add_tag_to_photo(&self, key: &CacheKey, tag: &TagId) -> Result<Photo, StoreError> {
        let photo = self.store.read_view().add_tag_to_photo(key, tag)?;
        self.save_read_view()?;
        Ok(photo)
    }

    /// Detach `tag` from the photo under `key` and save.
    ///
    /// # Errors
    ///
    /// Returns the store error when the photo is unknown or the save fails.
    pub fn remove_tag_from_photo(&self, key: &CacheKey, tag: &TagId) -> Result<Photo, StoreError> {
        let photo = self.store.read_view().remove_tag_from_photo(key, tag)?;
        self.save_read_view()?;
        Ok(photo)
    }

    /// Flip the favourite flag of the photo under `key` and save.
    ///
    /// # Errors
    ///
    /// Returns the store error when the photo is unknown or the save fails.
    pub fn toggle_favorite(&self, key: &CacheKey) -> Result<Photo, StoreError> {
        let photo = self.store.read_view().toggle_favorite(key)?;
        self.save_read_view()?;
        Ok(photo)
    }

    /// Record that the photo under `key` was opened and save.
    ///
    /// # Errors
    ///
    /// Returns the store error when the photo is unknown or the save fails.
    pub fn open_photo(&self, key: &CacheKey) -> Result<Photo, StoreError> {
        let photo = self.store.read_view().record_view(key)?;
        self.save_read_view()?;
        Ok(photo)
    }

    fn save_read_view(&self) -> Result<(), StoreError> {
        self.store.read_view().commit()
    }
}
