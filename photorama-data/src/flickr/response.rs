//! Wire types for Flickr photo listings.

use serde::Deserialize;
use serde_json::Value;

/// Top-level response envelope.
///
/// Successful listings carry `photos`; failures carry `stat = "fail"` with a
/// numeric code and a message.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope {
    #[serde(default)]
    pub photos: Option<PhotoPage>,
    #[serde(default)]
    pub stat: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One page of photo records.
///
/// Records stay as raw JSON so a malformed entry can be skipped without
/// rejecting its siblings.
#[derive(Debug, Deserialize)]
pub(super) struct PhotoPage {
    pub photo: Vec<Value>,
}

/// Fields read from a single photo record.
#[derive(Debug, Deserialize)]
pub(super) struct PhotoRecord {
    pub id: String,
    pub title: String,
    pub datetaken: String,
    pub url_h: String,
}
