//! Declarative photo and tag queries.
//!
//! A query pairs an optional predicate with an ordered list of sort keys.
//! Results keep insertion order wherever the sort keys compare equal.

use std::{cmp::Ordering, collections::BTreeSet};

use crate::{CacheKey, Photo, PhotoId, Tag, TagId};

/// Direction applied to a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Photo attributes usable as sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoField {
    /// [`Photo::date_taken`].
    DateTaken,
    /// [`Photo::title`].
    Title,
    /// [`Photo::view_count`].
    ViewCount,
    /// [`Photo::photo_id`].
    PhotoId,
    /// [`Photo::is_favorite`].
    IsFavorite,
}

impl PhotoField {
    fn compare(self, left: &Photo, right: &Photo) -> Ordering {
        match self {
            Self::DateTaken => left.date_taken.cmp(&right.date_taken),
            Self::Title => left.title.cmp(&right.title),
            Self::ViewCount => left.view_count.cmp(&right.view_count),
            Self::PhotoId => left.photo_id.cmp(&right.photo_id),
            Self::IsFavorite => left.is_favorite.cmp(&right.is_favorite),
        }
    }
}

/// One photo sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSortKey {
    /// Attribute compared.
    pub field: PhotoField,
    /// Direction of the comparison.
    pub order: SortOrder,
}

impl PhotoSortKey {
    /// Sort by `field`, smallest first.
    #[must_use]
    pub const fn ascending(field: PhotoField) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    /// Sort by `field`, largest first.
    #[must_use]
    pub const fn descending(field: PhotoField) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }
}

/// Filter applied to photos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoPredicate {
    /// Service identifier equals the value.
    PhotoIdIs(PhotoId),
    /// Service identifier is one of the values.
    PhotoIdIn(BTreeSet<PhotoId>),
    /// Cache key equals the value.
    CacheKeyIs(CacheKey),
    /// Cache key is one of the values.
    CacheKeyIn(BTreeSet<CacheKey>),
    /// Favourite flag equals the value.
    IsFavorite(bool),
    /// The tag is attached.
    HasTag(TagId),
    /// Every nested predicate holds.
    All(Vec<PhotoPredicate>),
}

impl PhotoPredicate {
    /// Evaluate the predicate against `photo`.
    #[must_use]
    pub fn matches(&self, photo: &Photo) -> bool {
        match self {
            Self::PhotoIdIs(id) => photo.photo_id == *id,
            Self::PhotoIdIn(ids) => ids.contains(&photo.photo_id),
            Self::CacheKeyIs(key) => photo.cache_key == *key,
            Self::CacheKeyIn(keys) => keys.contains(&photo.cache_key),
            Self::IsFavorite(flag) => photo.is_favorite == *flag,
            Self::HasTag(tag) => photo.has_tag(tag),
            Self::All(predicates) => predicates.iter().all(|p| p.matches(photo)),
        }
    }
}

/// Predicate plus ordering over photos.
///
/// # Examples
///
/// ```
/// use photorama_core::{PhotoField, PhotoPredicate, PhotoQuery, PhotoSortKey};
///
/// let query = PhotoQuery::all()
///     .with_predicate(PhotoPredicate::IsFavorite(true))
///     .sorted_by(PhotoSortKey::descending(PhotoField::DateTaken));
/// assert_eq!(query.sort.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoQuery {
    /// Filter. `None` matches every photo.
    pub predicate: Option<PhotoPredicate>,
    /// Sort keys, most significant first.
    pub sort: Vec<PhotoSortKey>,
}

impl PhotoQuery {
    /// Every photo in insertion order.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            predicate: None,
            sort: Vec::new(),
        }
    }

    /// Every photo, oldest `date_taken` first.
    #[must_use]
    pub fn by_date_taken() -> Self {
        Self::all().sorted_by(PhotoSortKey::ascending(PhotoField::DateTaken))
    }

    /// Replace the predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: PhotoPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Append a sort key of lower significance than the existing ones.
    #[must_use]
    pub fn sorted_by(mut self, key: PhotoSortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Whether `photo` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, photo: &Photo) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.matches(photo))
    }

    /// Filter and order `photos`, which are taken in insertion order.
    pub fn apply<'a, I>(&self, photos: I) -> Vec<Photo>
    where
        I: IntoIterator<Item = &'a Photo>,
    {
        let mut selected: Vec<Photo> = photos
            .into_iter()
            .filter(|photo| self.matches(photo))
            .cloned()
            .collect();
        // `sort_by` is stable, so ties keep insertion order.
        selected.sort_by(|left, right| self.compare(left, right));
        selected
    }

    fn compare(&self, left: &Photo, right: &Photo) -> Ordering {
        self.sort.iter().fold(Ordering::Equal, |acc, key| {
            acc.then_with(|| key.order.apply(key.field.compare(left, right)))
        })
    }
}

/// Filter applied to tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPredicate {
    /// Name equals the value.
    NameIs(String),
    /// Identifier is one of the values.
    TagIdIn(BTreeSet<TagId>),
}

impl TagPredicate {
    /// Evaluate the predicate against `tag`.
    #[must_use]
    pub fn matches(&self, tag: &Tag) -> bool {
        match self {
            Self::NameIs(name) => tag.name == *name,
            Self::TagIdIn(ids) => ids.contains(&tag.tag_id),
        }
    }
}

/// Predicate plus name ordering over tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagQuery {
    /// Filter. `None` matches every tag.
    pub predicate: Option<TagPredicate>,
    /// Name ordering. `None` keeps insertion order.
    pub order_by_name: Option<SortOrder>,
}

impl TagQuery {
    /// Every tag ordered by name, as shown in tag pickers.
    #[must_use]
    pub const fn by_name() -> Self {
        Self {
            predicate: None,
            order_by_name: Some(SortOrder::Ascending),
        }
    }

    /// Replace the predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: TagPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Filter and order `tags`, which are taken in insertion order.
    pub fn apply<'a, I>(&self, tags: I) -> Vec<Tag>
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let mut selected: Vec<Tag> = tags
            .into_iter()
            .filter(|tag| self.predicate.as_ref().is_none_or(|p| p.matches(tag)))
            .cloned()
            .collect();
        if let Some(order) = self.order_by_name {
            selected.sort_by(|left, right| order.apply(left.name.cmp(&right.name)));
        }
        selected
    }
}
