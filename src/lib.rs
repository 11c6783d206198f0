//! Facade crate for the Photorama photo library.
//!
//! This crate re-exports the core domain types and the entity store, and
//! exposes the ingestion pipeline and image cache behind the `pipeline`
//! feature.

#![forbid(unsafe_code)]

pub use photorama_core::{
    CacheKey, ChangeBatch, EntityBackend, EntityStore, MemoryBackend, NewPhoto, Photo,
    PhotoField, PhotoId, PhotoPredicate, PhotoQuery, PhotoSortKey, Snapshot, SortOrder,
    StoreError, StoreView, Tag, TagId, TagPredicate, TagQuery, ViewKind,
};

#[cfg(feature = "store-sqlite")]
pub use photorama_core::SqliteBackend;

#[cfg(feature = "pipeline")]
pub use photorama_data::{
    ApiMethod, CacheStats, CachedImage, DecodeError, FetchPhotosError, FetchStage, FlickrApi,
    HttpTransport, HttpTransportConfig, ImageCache, ImageCacheConfig, ImageFetchError,
    PhotoService, Transport, TransportError, decode_photos,
};
