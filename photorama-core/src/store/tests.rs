//! Unit tests for views and the two-phase save.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::{
    PhotoId, PhotoPredicate, PhotoQuery, TagId, TagQuery,
    test_support::{FaultyBackend, new_photo},
};

struct Harness {
    backend: Arc<FaultyBackend>,
    store: EntityStore,
}

#[fixture]
fn harness() -> Harness {
    let backend = Arc::new(FaultyBackend::default());
    let store = EntityStore::new(backend.clone()).expect("open store");
    Harness { backend, store }
}

fn all_ids(view: &StoreView) -> Vec<String> {
    view.query_photos(&PhotoQuery::all())
        .into_iter()
        .map(|p| p.photo_id.to_string())
        .collect()
}

#[rstest]
fn uncommitted_inserts_stay_in_their_view(harness: Harness) {
    let write = harness.store.write_view();
    write
        .insert_photo(new_photo("1", "2024-01-01 00:00:00"))
        .expect("insert");
    assert_eq!(all_ids(write), ["1"]);
    assert!(all_ids(harness.store.read_view()).is_empty());

    harness.store.save_changes().expect("save");
    assert_eq!(all_ids(harness.store.read_view()), ["1"]);
    assert!(!write.has_changes());
}

#[rstest]
fn duplicate_insert_in_one_view_is_rejected(harness: Harness) {
    let write = harness.store.write_view();
    write
        .insert_photo(new_photo("5", "2024-01-01 00:00:00"))
        .expect("first insert");
    let err = write
        .insert_photo(new_photo("5", "2024-01-02 00:00:00"))
        .expect_err("second insert must fail");
    assert!(matches!(err, StoreError::ConstraintViolation { .. }));
}

#[rstest]
fn find_or_insert_keeps_the_first_record(harness: Harness) {
    let write = harness.store.write_view();
    let (first, inserted) = write.find_or_insert_photo(new_photo("8", "2024-01-01 00:00:00"));
    assert!(inserted);
    let mut changed = new_photo("8", "2030-01-01 00:00:00");
    changed.title = "Renamed".into();
    let (second, inserted_again) = write.find_or_insert_photo(changed);
    assert!(!inserted_again);
    assert_eq!(first, second);
    assert_eq!(write.photo_count(), 1);
}

#[rstest]
fn failed_write_commit_keeps_pending_changes(harness: Harness) {
    harness.backend.fail_commits_from(ViewKind::Write, true);
    harness
        .store
        .write_view()
        .insert_photo(new_photo("2", "2024-01-01 00:00:00"))
        .expect("insert");

    let err = harness.store.save_changes().expect_err("commit must fail");
    assert!(err.is_retryable());
    assert!(harness.store.write_view().has_changes());
    assert!(all_ids(harness.store.read_view()).is_empty());

    harness.backend.fail_commits_from(ViewKind::Write, false);
    harness.store.save_changes().expect("retry");
    assert_eq!(all_ids(harness.store.read_view()), ["2"]);
}

#[rstest]
fn read_commit_failure_does_not_undo_write_commit(harness: Harness) {
    let inserted = harness
        .store
        .write_view()
        .insert_photo(new_photo("3", "2024-01-01 00:00:00"))
        .expect("insert");
    harness.store.save_changes().expect("first save");
    harness
        .store
        .read_view()
        .record_view(&inserted.cache_key)
        .expect("record view");
    harness
        .store
        .write_view()
        .insert_photo(new_photo("4", "2024-01-02 00:00:00"))
        .expect("insert");

    harness.backend.fail_commits_from(ViewKind::Read, true);
    assert!(harness.store.save_changes().is_err());
    assert!(!harness.store.write_view().has_changes());
    assert!(harness.store.read_view().has_changes());
    assert_eq!(harness.backend.applied_batches(), 2);

    let persisted = harness.backend.load().expect("load");
    assert_eq!(persisted.photos.len(), 2);
    assert!(persisted.photos.iter().all(|p| p.view_count == 0));
}

#[rstest]
fn updates_cannot_touch_identity_fields(harness: Harness) {
    let view = harness.store.read_view();
    let original = view
        .insert_photo(new_photo("6", "2024-01-01 00:00:00"))
        .expect("insert");
    let updated = view
        .update_photo(&original.cache_key, |photo| {
            photo.photo_id = PhotoId::new("other");
            photo.title = "changed".into();
            photo.is_favorite = true;
        })
        .expect("update");
    assert_eq!(updated.photo_id, original.photo_id);
    assert_eq!(updated.title, original.title);
    assert!(updated.is_favorite);
}

#[rstest]
fn attaching_an_unknown_tag_fails(harness: Harness) {
    let view = harness.store.read_view();
    let photo = view
        .insert_photo(new_photo("7", "2024-01-01 00:00:00"))
        .expect("insert");
    let err = view
        .add_tag_to_photo(&photo.cache_key, &TagId::generate())
        .expect_err("unknown tag");
    assert!(matches!(err, StoreError::NotFound { entity: "tag", .. }));
    assert!(view.photo(&photo.cache_key).expect("photo").tags.is_empty());
}

#[rstest]
fn tags_attach_and_filter(harness: Harness) {
    let view = harness.store.read_view();
    let photo = view
        .insert_photo(new_photo("9", "2024-01-01 00:00:00"))
        .expect("insert");
    let tag = view.insert_tag("  harbour ").expect("tag");
    assert_eq!(tag.name, "harbour");
    view.add_tag_to_photo(&photo.cache_key, &tag.tag_id)
        .expect("attach");
    view.commit().expect("commit");

    let tagged = view.query_photos(
        &PhotoQuery::all().with_predicate(PhotoPredicate::HasTag(tag.tag_id)),
    );
    assert_eq!(tagged.len(), 1);
    assert_eq!(view.query_tags(&TagQuery::by_name()), vec![tag]);
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_tag_names_are_rejected(harness: Harness, #[case] name: &str) {
    let err = harness
        .store
        .read_view()
        .insert_tag(name)
        .expect_err("blank name");
    assert!(matches!(err, StoreError::ConstraintViolation { .. }));
}

#[rstest]
fn refresh_waits_for_pending_changes(harness: Harness) {
    let write = harness.store.write_view();
    write
        .insert_photo(new_photo("10", "2024-01-01 00:00:00"))
        .expect("insert");
    assert!(!write.refresh().expect("refresh"));
    harness.store.save_changes().expect("save");
    assert!(write.refresh().expect("refresh"));
    assert_eq!(all_ids(write), ["10"]);
}

#[rstest]
fn missing_photo_updates_report_not_found(harness: Harness) {
    let err = harness
        .store
        .read_view()
        .toggle_favorite(&crate::CacheKey::generate())
        .expect_err("missing photo");
    assert!(matches!(err, StoreError::NotFound { entity: "photo", .. }));
}
