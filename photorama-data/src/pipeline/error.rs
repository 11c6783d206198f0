//! Errors raised by the ingestion pipeline.

use photorama_core::{CacheKey, StoreError};
use thiserror::Error;
use tokio::task::JoinError;

use crate::{flickr::DecodeError, transport::TransportError};

use super::FetchStage;

/// Failure of a photo listing fetch.
#[derive(Debug, Error)]
pub enum FetchPhotosError {
    /// A search was requested without a usable keyword.
    #[error("a search needs a non-blank keyword")]
    MissingKeyword,
    /// The listing could not be downloaded.
    #[error("failed to fetch photo listing: {source}")]
    Transport {
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The listing could not be decoded.
    #[error("failed to decode photo listing: {source}")]
    Decode {
        /// Underlying decode failure.
        #[source]
        source: DecodeError,
    },
    /// Saving the decoded photos failed.
    #[error("failed to save photos: {source}")]
    Store {
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// The blocking worker panicked or was cancelled.
    #[error("background ingestion task failed: {source}")]
    Background {
        /// Join failure reported by Tokio.
        #[source]
        source: JoinError,
    },
}

impl FetchPhotosError {
    /// Stage during which the fetch failed.
    #[must_use]
    pub const fn stage(&self) -> FetchStage {
        match self {
            Self::MissingKeyword => FetchStage::Idle,
            Self::Transport { .. } => FetchStage::Requesting,
            Self::Decode { .. } | Self::Background { .. } => FetchStage::Decoding,
            Self::Store { .. } => FetchStage::Persisting,
        }
    }
}

/// Failure of an image fetch.
#[derive(Debug, Error)]
pub enum ImageFetchError {
    /// The image could not be downloaded.
    #[error("failed to download image for {cache_key}: {source}")]
    Transport {
        /// Key of the photo whose image was requested.
        cache_key: CacheKey,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The downloaded bytes are not a decodable image.
    #[error("failed to decode image for {cache_key}: {source}")]
    ImageDecode {
        /// Key of the photo whose image was requested.
        cache_key: CacheKey,
        /// Decoder failure.
        #[source]
        source: image::ImageError,
    },
    /// The blocking worker panicked or was cancelled.
    #[error("background image task failed: {source}")]
    Background {
        /// Join failure reported by Tokio.
        #[source]
        source: JoinError,
    },
}
