//! Decoding of photo listings into stored photos.

use chrono::NaiveDateTime;
use log::debug;
use photorama_core::{DATE_TAKEN_FORMAT, NewPhoto, Photo, PhotoId, StoreError, StoreView};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::response::{Envelope, PhotoRecord};

/// Failure decoding a whole listing.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a photo listing, or none of its records decoded.
    #[error("response is not a valid photo listing: {reason}")]
    InvalidFormat {
        /// What was wrong.
        reason: String,
    },
    /// The service reported a failure instead of a listing.
    #[error("photo service returned error {code}: {message}")]
    Service {
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },
    /// The view used for deduplication could not be reloaded.
    #[error("failed to prepare the deduplication view: {source}")]
    Store {
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
}

/// Decode a listing, inserting unseen photos through `view`.
///
/// A view without pending changes is first reloaded so the lookup sees
/// photos committed elsewhere.
///
/// Records missing a field, with an unparseable date or with a relative or
/// malformed URL are skipped. A record whose identifier is already visible to
/// `view` yields the existing photo unchanged. Output follows record order.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidFormat`] when the payload cannot be parsed
/// or when a non-empty listing produces no photos,
/// [`DecodeError::Service`] for a `stat = "fail"` response and
/// [`DecodeError::Store`] when the view cannot be reloaded.
pub fn decode_photos(data: &[u8], view: &StoreView) -> Result<Vec<Photo>, DecodeError> {
    let envelope: Envelope =
        serde_json::from_slice(data).map_err(|err| DecodeError::InvalidFormat {
            reason: err.to_string(),
        })?;
    let Some(page) = envelope.photos else {
        return Err(match envelope.stat.as_deref() {
            Some("fail") => DecodeError::Service {
                code: envelope.code.unwrap_or_default(),
                message: envelope.message.unwrap_or_default(),
            },
            _ => DecodeError::InvalidFormat {
                reason: "missing `photos` object".to_owned(),
            },
        });
    };

    view.refresh()
        .map_err(|source| DecodeError::Store { source })?;

    let total = page.photo.len();
    let mut photos = Vec::with_capacity(total);
    let mut inserted = 0_usize;
    for (index, record) in page.photo.into_iter().enumerate() {
        let new = match parse_record(record) {
            Ok(new) => new,
            Err(reason) => {
                debug!("skipping photo record {index}: {reason}");
                continue;
            }
        };
        let (photo, created) = view.find_or_insert_photo(new);
        if created {
            inserted = inserted.saturating_add(1);
        }
        photos.push(photo);
    }

    if photos.is_empty() && total > 0 {
        return Err(DecodeError::InvalidFormat {
            reason: format!("none of the {total} photo records could be decoded"),
        });
    }
    debug!(
        "decoded {} of {total} photo records, {inserted} new",
        photos.len()
    );
    Ok(photos)
}

fn parse_record(record: Value) -> Result<NewPhoto, String> {
    let fields: PhotoRecord = serde_json::from_value(record).map_err(|err| err.to_string())?;
    let date_taken = NaiveDateTime::parse_from_str(&fields.datetaken, DATE_TAKEN_FORMAT)
        .map_err(|err| format!("photo {}: bad datetaken {:?}: {err}", fields.id, fields.datetaken))?;
    let remote_url = Url::parse(&fields.url_h)
        .map_err(|err| format!("photo {}: bad url_h {:?}: {err}", fields.id, fields.url_h))?;
    Ok(NewPhoto {
        photo_id: PhotoId::new(fields.id),
        title: fields.title,
        remote_url,
        date_taken,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use photorama_core::{EntityStore, MemoryBackend};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::sync::Arc;

    #[fixture]
    fn store() -> EntityStore {
        EntityStore::new(Arc::new(MemoryBackend::default())).expect("open store")
    }

    fn record(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "datetaken": "2024-04-05 06:07:08",
            "url_h": format!("https://live.staticflickr.com/{id}_h.jpg"),
        })
    }

    fn listing(records: &[Value]) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "photos": { "page": 1, "photo": records },
            "stat": "ok",
        }))
        .expect("serialise listing")
    }

    fn ids(photos: &[Photo]) -> Vec<&str> {
        photos.iter().map(|p| p.photo_id.as_str()).collect()
    }

    #[rstest]
    fn decodes_records_in_order(store: EntityStore) {
        let data = listing(&[record("2", "two"), record("1", "one")]);
        let photos = decode_photos(&data, store.write_view()).expect("decode");
        assert_eq!(ids(&photos), ["2", "1"]);
        assert!(photos.iter().all(|p| p.view_count == 0));
        assert_eq!(store.write_view().photo_count(), 2);
    }

    #[rstest]
    fn skips_malformed_records(store: EntityStore) {
        let data = listing(&[
            record("1", "kept"),
            json!({ "id": "2", "title": "no url", "datetaken": "2024-04-05 06:07:08" }),
            json!({ "id": "3", "title": "bad date", "datetaken": "yesterday",
                    "url_h": "https://live.staticflickr.com/3_h.jpg" }),
            json!({ "id": "4", "title": "relative", "datetaken": "2024-04-05 06:07:08",
                    "url_h": "/4_h.jpg" }),
            json!({ "id": 5, "title": "numeric id", "datetaken": "2024-04-05 06:07:08",
                    "url_h": "https://live.staticflickr.com/5_h.jpg" }),
        ]);
        let photos = decode_photos(&data, store.write_view()).expect("decode");
        assert_eq!(ids(&photos), ["1"]);
    }

    #[rstest]
    fn all_malformed_is_invalid_format(store: EntityStore) {
        let data = listing(&[json!({ "id": "1" }), json!("garbage")]);
        let err = decode_photos(&data, store.write_view()).expect_err("must fail");
        assert!(matches!(err, DecodeError::InvalidFormat { .. }), "{err:?}");
        assert_eq!(store.write_view().photo_count(), 0);
    }

    #[rstest]
    fn empty_listing_is_not_an_error(store: EntityStore) {
        let photos = decode_photos(&listing(&[]), store.write_view()).expect("decode");
        assert!(photos.is_empty());
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(br#"{"stat":"ok"}"#.as_slice())]
    #[case(br#"{"photos":{"page":1}}"#.as_slice())]
    fn unusable_payloads_are_invalid_format(store: EntityStore, #[case] data: &[u8]) {
        let err = decode_photos(data, store.write_view()).expect_err("must fail");
        assert!(matches!(err, DecodeError::InvalidFormat { .. }), "{err:?}");
    }

    #[rstest]
    fn service_failures_are_reported(store: EntityStore) {
        let data = br#"{"stat":"fail","code":100,"message":"Invalid API Key"}"#;
        let err = decode_photos(data, store.write_view()).expect_err("must fail");
        assert!(
            matches!(&err, DecodeError::Service { code: 100, message } if message == "Invalid API Key"),
            "{err:?}"
        );
    }

    #[rstest]
    fn decoding_twice_reuses_photos(store: EntityStore) {
        let data = listing(&[record("1", "one"), record("2", "two")]);
        let first = decode_photos(&data, store.write_view()).expect("first decode");
        store.save_changes().expect("save");
        let second = decode_photos(&data, store.write_view()).expect("second decode");
        assert_eq!(first, second);
        assert_eq!(store.read_view().photo_count(), 2);
        assert!(!store.write_view().has_changes());
    }

    #[rstest]
    fn first_write_wins(store: EntityStore) {
        let first = listing(&[record("1", "original")]);
        let second = listing(&[record("1", "renamed")]);
        decode_photos(&first, store.write_view()).expect("first decode");
        let photos = decode_photos(&second, store.write_view()).expect("second decode");
        assert_eq!(photos.first().map(|p| p.title.as_str()), Some("original"));
    }

    #[rstest]
    fn repeated_ids_within_a_listing_collapse(store: EntityStore) {
        let data = listing(&[record("1", "one"), record("1", "again")]);
        let photos = decode_photos(&data, store.write_view()).expect("decode");
        assert_eq!(photos.len(), 2);
        assert_eq!(
            photos.first().map(|p| p.cache_key),
            photos.last().map(|p| p.cache_key)
        );
        assert_eq!(store.write_view().photo_count(), 1);
    }
}
