#![forbid(unsafe_code)]
//! Remote photo ingestion and image caching for Photorama.
//!
//! The crate talks to the Flickr REST API over a pluggable [`Transport`],
//! decodes listings into the [`photorama_core`] entity store and keeps a
//! memory and disk cache of downloaded images. [`PhotoService`] ties the
//! pieces together.

pub mod cache;
pub mod flickr;
pub mod pipeline;
pub mod transport;

pub use cache::{CacheStats, CachedImage, ImageCache, ImageCacheConfig, ImageCacheError};
pub use flickr::{ApiMethod, DecodeError, FlickrApi, FlickrConfigError, decode_photos};
pub use pipeline::{FetchPhotosError, FetchStage, ImageFetchError, PhotoService};
pub use transport::{HttpTransport, HttpTransportConfig, Transport, TransportError};
