//! Flickr REST API client: request URLs and response decoding.

use std::fmt;

use thiserror::Error;
use url::Url;

mod decode;
mod response;

pub use decode::{DecodeError, decode_photos};

/// Default Flickr REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest";

/// Extra fields requested for every photo listing.
pub const PHOTO_EXTRAS: &str = "url_h,date_taken";

/// Page size requested for the recent-photos listing.
pub const RECENT_PAGE_SIZE: &str = "50";

/// Remote methods the client can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// `flickr.photos.getRecent`.
    RecentPhotos,
    /// `flickr.photos.search`.
    Search,
}

impl ApiMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecentPhotos => "flickr.photos.getRecent",
            Self::Search => "flickr.photos.search",
        }
    }

    /// Whether the method takes a free-text `text` parameter.
    #[must_use]
    pub const fn accepts_text(self) -> bool {
        matches!(self, Self::Search)
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when configuring [`FlickrApi`].
#[derive(Debug, Error)]
pub enum FlickrConfigError {
    /// The endpoint is not an absolute URL.
    #[error("invalid endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        /// Rejected endpoint text.
        endpoint: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The endpoint cannot carry a query string.
    #[error("endpoint {endpoint:?} cannot be used as a base URL")]
    NotABase {
        /// Rejected endpoint text.
        endpoint: String,
    },
    /// No API key was supplied.
    #[error("API key must not be blank")]
    MissingApiKey,
}

/// Builds request URLs for the Flickr REST API.
///
/// # Examples
///
/// ```
/// use photorama_data::flickr::{DEFAULT_ENDPOINT, FlickrApi};
///
/// let api = FlickrApi::new(DEFAULT_ENDPOINT, "key")?;
/// let url = api.search_photos_url("harbour");
/// assert!(url.as_str().ends_with("&text=harbour"));
/// # Ok::<(), photorama_data::flickr::FlickrConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlickrApi {
    endpoint: Url,
    api_key: String,
}

impl FlickrApi {
    /// Target `endpoint` with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`FlickrConfigError`] when the endpoint is not an absolute
    /// base URL or the key is blank.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, FlickrConfigError> {
        let parsed = Url::parse(endpoint).map_err(|source| FlickrConfigError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(FlickrConfigError::NotABase {
                endpoint: endpoint.to_owned(),
            });
        }
        let key = api_key.into();
        if key.trim().is_empty() {
            return Err(FlickrConfigError::MissingApiKey);
        }
        Ok(Self {
            endpoint: parsed,
            api_key: key,
        })
    }

    /// Endpoint every request targets.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build a request URL.
    ///
    /// Query parameters appear in this order: `method`, `format=json`,
    /// `nojsoncallback=1`, `api_key`, then `params` as given, then
    /// `text=<keyword>` when a keyword is given and `method` accepts text.
    #[must_use]
    pub fn url(&self, method: ApiMethod, params: &[(&str, &str)], keyword: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .clear()
                .append_pair("method", method.as_str())
                .append_pair("format", "json")
                .append_pair("nojsoncallback", "1")
                .append_pair("api_key", &self.api_key);
            for (name, value) in params {
                query.append_pair(name, value);
            }
            if let Some(text) = keyword.filter(|_| method.accepts_text()) {
                query.append_pair("text", text);
            }
        }
        url
    }

    /// URL listing the most recent public photos.
    #[must_use]
    pub fn recent_photos_url(&self) -> Url {
        self.url(
            ApiMethod::RecentPhotos,
            &[("extras", PHOTO_EXTRAS), ("per_page", RECENT_PAGE_SIZE)],
            None,
        )
    }

    /// URL searching public photos for `keyword`.
    #[must_use]
    pub fn search_photos_url(&self, keyword: &str) -> Url {
        self.url(ApiMethod::Search, &[("extras", PHOTO_EXTRAS)], Some(keyword))
    }
}
