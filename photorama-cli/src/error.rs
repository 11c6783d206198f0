//! Error types emitted by the Photorama CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use photorama_core::StoreError;
use photorama_data::{FetchPhotosError, FlickrConfigError, ImageCacheError, ImageFetchError};
use thiserror::Error;

/// Errors emitted by the Photorama CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option holds a value the CLI cannot use.
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    /// The API endpoint or key was rejected.
    #[error(transparent)]
    FlickrConfig(#[from] FlickrConfigError),
    /// The data directory could not be created.
    #[error("failed to prepare data directory {path:?}: {source}")]
    PrepareDataDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The photo database could not be opened.
    #[error("failed to open photo database {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// The image cache could not be opened.
    #[error(transparent)]
    OpenCache(#[from] ImageCacheError),
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    BuildTransport(#[source] reqwest::Error),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Fetching a photo listing failed.
    #[error(transparent)]
    FetchPhotos(#[from] FetchPhotosError),
    /// Fetching an image failed.
    #[error(transparent)]
    FetchImage(#[from] ImageFetchError),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No stored photo has the requested identifier.
    #[error("no stored photo has identifier {photo_id:?}")]
    UnknownPhoto { photo_id: String },
    /// No tag has the requested name.
    #[error("no tag is named {name:?}")]
    UnknownTag { name: String },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
