//! HTTP transport used to reach the photo service and image hosts.
//!
//! The [`Transport`] trait is the seam between the ingestion pipeline and the
//! network. [`HttpTransport`] implements it over `reqwest`, and tests use the
//! stub in [`test_support`].

use std::{io, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use http::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, HttpTransport, HttpTransportConfig};

/// Performs a GET request and returns the whole response body.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] for non-success statuses and
    /// [`TransportError::Network`] when the request could not complete.
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        (**self).get(url).await
    }
}

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed before a status was received.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Whether the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network { source, .. } if source.kind() == io::ErrorKind::TimedOut)
    }

    /// URL of the failed request.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Http { url, .. } | Self::Network { url, .. } => url,
        }
    }
}
