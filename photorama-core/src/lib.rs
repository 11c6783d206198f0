//! Core domain types and persistence for the Photorama photo library.
//!
//! Photos are identified by the remote service's [`PhotoId`] and, locally,
//! by a generated [`CacheKey`] that also names the cached image. The
//! [`EntityStore`] keeps every photo and [`Tag`] behind two isolated views:
//! background ingestion writes through one and the user-facing side reads
//! and edits through the other.
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod photo;
mod query;
pub mod store;
mod tag;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use photo::{CacheKey, DATE_TAKEN_FORMAT, NewPhoto, Photo, PhotoId};
pub use query::{
    PhotoField, PhotoPredicate, PhotoQuery, PhotoSortKey, SortOrder, TagPredicate, TagQuery,
};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteBackend;
pub use store::{
    ChangeBatch, EntityBackend, EntityStore, MemoryBackend, Snapshot, StoreError, StoreView,
    ViewKind,
};
pub use tag::{Tag, TagId};
