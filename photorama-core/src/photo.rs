//! Photo entities and their identifiers.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::NaiveDateTime;
use url::Url;
use uuid::Uuid;

use crate::TagId;

/// Format used for the `date_taken` field, both on the wire and at rest.
pub const DATE_TAKEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier assigned to a photo by the remote photo service.
///
/// At most one stored photo carries any given identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PhotoId(String);

impl PhotoId {
    /// Wrap a service identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for PhotoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Locally generated key naming a photo in the image cache and the store.
///
/// The key is assigned exactly once, when the photo is first inserted, and
/// never changes afterwards.
///
/// # Examples
///
/// ```
/// use photorama_core::CacheKey;
///
/// let key = CacheKey::generate();
/// let parsed: CacheKey = key.to_string().parse().expect("round trip");
/// assert_eq!(key, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CacheKey(Uuid);

impl CacheKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for CacheKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Fields decoded from the service for a photo that is not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    /// Service identifier.
    pub photo_id: PhotoId,
    /// Display title. May be empty.
    pub title: String,
    /// Location of the full-size image.
    pub remote_url: Url,
    /// Moment the photo was taken.
    pub date_taken: NaiveDateTime,
}

/// A photo known to the library.
///
/// `photo_id`, `title`, `remote_url`, `date_taken` and `cache_key` are fixed
/// at insertion. The remaining fields are user state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Photo {
    /// Service identifier.
    pub photo_id: PhotoId,
    /// Display title.
    pub title: String,
    /// Location of the full-size image.
    pub remote_url: Url,
    /// Moment the photo was taken.
    pub date_taken: NaiveDateTime,
    /// Image cache key and stable local identity.
    pub cache_key: CacheKey,
    /// Number of times the photo has been opened.
    pub view_count: u32,
    /// Whether the user marked the photo as a favourite.
    pub is_favorite: bool,
    /// Tags attached to the photo.
    pub tags: BTreeSet<TagId>,
}

impl Photo {
    /// Materialise a freshly decoded photo under `cache_key`.
    ///
    /// The view count starts at zero and no tags are attached.
    #[must_use]
    pub fn from_new(new: NewPhoto, cache_key: CacheKey) -> Self {
        let NewPhoto {
            photo_id,
            title,
            remote_url,
            date_taken,
        } = new;
        Self {
            photo_id,
            title,
            remote_url,
            date_taken,
            cache_key,
            view_count: 0,
            is_favorite: false,
            tags: BTreeSet::new(),
        }
    }

    /// Attach `tag`. Returns `false` when it was already attached.
    pub fn add_tag(&mut self, tag: TagId) -> bool {
        self.tags.insert(tag)
    }

    /// Detach `tag`. Returns `false` when it was not attached.
    pub fn remove_tag(&mut self, tag: &TagId) -> bool {
        self.tags.remove(tag)
    }

    /// Whether `tag` is attached.
    #[must_use]
    pub fn has_tag(&self, tag: &TagId) -> bool {
        self.tags.contains(tag)
    }

    /// Count one more view and return the new total.
    pub const fn record_view(&mut self) -> u32 {
        self.view_count = self.view_count.saturating_add(1);
        self.view_count
    }

    /// Flip the favourite flag and return its new value.
    pub const fn toggle_favorite(&mut self) -> bool {
        self.is_favorite = !self.is_favorite;
        self.is_favorite
    }

    /// Format `date_taken` with [`DATE_TAKEN_FORMAT`].
    #[must_use]
    pub fn date_taken_text(&self) -> String {
        self.date_taken.format(DATE_TAKEN_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn photo() -> Photo {
        let new = NewPhoto {
            photo_id: PhotoId::new("42"),
            title: "Harbour".into(),
            remote_url: Url::parse("https://live.example.com/42_h.jpg").expect("valid url"),
            date_taken: NaiveDateTime::parse_from_str("2024-05-01 08:30:00", DATE_TAKEN_FORMAT)
                .expect("valid date"),
        };
        Photo::from_new(new, CacheKey::generate())
    }

    #[rstest]
    fn new_photo_starts_unviewed_and_untagged(photo: Photo) {
        assert_eq!(photo.view_count, 0);
        assert!(!photo.is_favorite);
        assert!(photo.tags.is_empty());
        assert_eq!(photo.date_taken_text(), "2024-05-01 08:30:00");
    }

    #[rstest]
    fn record_view_increments(mut photo: Photo) {
        assert_eq!(photo.record_view(), 1);
        assert_eq!(photo.record_view(), 2);
    }

    #[rstest]
    fn record_view_saturates(mut photo: Photo) {
        photo.view_count = u32::MAX;
        assert_eq!(photo.record_view(), u32::MAX);
    }

    #[rstest]
    fn toggle_favorite_flips(mut photo: Photo) {
        assert!(photo.toggle_favorite());
        assert!(!photo.toggle_favorite());
    }

    #[rstest]
    fn tag_membership_is_a_set(mut photo: Photo) {
        let tag = TagId::generate();
        assert!(photo.add_tag(tag));
        assert!(!photo.add_tag(tag));
        assert!(photo.has_tag(&tag));
        assert!(photo.remove_tag(&tag));
        assert!(!photo.remove_tag(&tag));
    }

    #[rstest]
    #[case("not-a-uuid")]
    #[case("")]
    fn cache_key_rejects_garbage(#[case] text: &str) {
        assert!(text.parse::<CacheKey>().is_err());
    }
}
