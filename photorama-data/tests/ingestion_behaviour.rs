//! Behavioural tests for photo ingestion using rstest-bdd.

use std::{cell::RefCell, collections::BTreeMap, sync::Arc};

use camino::Utf8PathBuf;
use photorama_core::{CacheKey, EntityStore, PhotoQuery, ViewKind, test_support::FaultyBackend};
use photorama_data::{
    ApiMethod, FetchPhotosError, FetchStage, FlickrApi, ImageCache, ImageCacheConfig,
    PhotoService,
    flickr::DEFAULT_ENDPOINT,
    transport::test_support::{StubResponse, StubTransport},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};
use tempfile::TempDir;

fn record(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Harbour {id}"),
        "datetaken": format!("2024-05-0{id} 10:00:00"),
        "url_h": format!("https://live.staticflickr.com/{id}_h.jpg"),
    })
}

fn listing(records: Vec<Value>) -> StubResponse {
    StubResponse::Body(
        serde_json::to_vec(&json!({ "photos": { "photo": records }, "stat": "ok" }))
            .expect("serialise listing"),
    )
}

/// Shared state for ingestion scenarios.
struct IngestionWorld {
    temp_dir: TempDir,
    backend: Arc<FaultyBackend>,
    service: RefCell<Option<PhotoService<StubTransport>>>,
    first_keys: RefCell<BTreeMap<String, CacheKey>>,
    error: RefCell<Option<FetchPhotosError>>,
}

impl IngestionWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            backend: Arc::new(FaultyBackend::default()),
            service: RefCell::new(None),
            first_keys: RefCell::new(BTreeMap::new()),
            error: RefCell::new(None),
        }
    }

    fn serve(&self, response: StubResponse) {
        let directory = Utf8PathBuf::from_path_buf(self.temp_dir.path().join("images"))
            .expect("utf-8 path");
        let images = ImageCache::open(&ImageCacheConfig::new(directory)).expect("open cache");
        let store = EntityStore::new(self.backend.clone()).expect("open store");
        let api = FlickrApi::new(DEFAULT_ENDPOINT, "behaviour-key").expect("valid api");
        let transport = StubTransport::new().with_route("getRecent", response);
        self.service.replace(Some(PhotoService::new(
            api,
            transport,
            Arc::new(store),
            Arc::new(images),
        )));
    }

    fn with_service<T>(&self, f: impl FnOnce(&PhotoService<StubTransport>) -> T) -> T {
        let borrowed = self.service.borrow();
        f(borrowed.as_ref().expect("service should be configured"))
    }

    fn stored(&self) -> BTreeMap<String, CacheKey> {
        self.with_service(|service| {
            service
                .photos(&PhotoQuery::all())
                .into_iter()
                .map(|p| (p.photo_id.as_str().to_owned(), p.cache_key))
                .collect()
        })
    }

    fn fetch(&self) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        let result = self.with_service(|service| {
            runtime.block_on(service.fetch_photos(ApiMethod::RecentPhotos, None))
        });
        self.error.replace(result.err());
    }

    fn failed_stage(&self) -> FetchStage {
        self.error
            .borrow()
            .as_ref()
            .map(FetchPhotosError::stage)
            .expect("the fetch should have failed")
    }
}

#[fixture]
fn world() -> IngestionWorld {
    IngestionWorld::new()
}

#[given("a photo service backed by a stubbed listing of three photos")]
fn three_photos(world: &IngestionWorld) {
    world.serve(listing(vec![record("1"), record("2"), record("3")]));
}

#[given("a photo service backed by a listing with one malformed record")]
fn one_malformed(world: &IngestionWorld) {
    world.serve(listing(vec![
        record("1"),
        json!({ "id": "2", "title": "no image" }),
        record("3"),
    ]));
}

#[given("a photo service backed by a listing of malformed records")]
fn all_malformed(world: &IngestionWorld) {
    world.serve(listing(vec![json!({ "id": "1" }), json!(["not", "a", "record"])]));
}

#[given("the store rejects the next write commit")]
fn reject_write(world: &IngestionWorld) {
    world.backend.fail_commits_from(ViewKind::Write, true);
}

#[when("the store accepts commits again")]
fn accept_commits(world: &IngestionWorld) {
    world.backend.fail_commits_from(ViewKind::Write, false);
}

#[when("recent photos are fetched")]
fn fetch_once(world: &IngestionWorld) {
    world.fetch();
}

#[when("recent photos are fetched twice")]
fn fetch_twice(world: &IngestionWorld) {
    world.fetch();
    world.first_keys.replace(world.stored());
    world.fetch();
}

#[then("the store holds three photos")]
fn holds_three(world: &IngestionWorld) {
    assert_eq!(world.stored().len(), 3);
}

#[then("the store holds two photos")]
fn holds_two(world: &IngestionWorld) {
    let ids: Vec<String> = world.stored().into_keys().collect();
    assert_eq!(ids, ["1", "3"]);
}

#[then("the store holds no photos")]
fn holds_none(world: &IngestionWorld) {
    assert!(world.stored().is_empty());
}

#[then("each photo kept its first cache key")]
fn kept_keys(world: &IngestionWorld) {
    assert_eq!(*world.first_keys.borrow(), world.stored());
}

#[then("the fetch fails while decoding")]
fn fails_decoding(world: &IngestionWorld) {
    assert_eq!(world.failed_stage(), FetchStage::Decoding);
}

#[then("the fetch fails while persisting")]
fn fails_persisting(world: &IngestionWorld) {
    assert_eq!(world.failed_stage(), FetchStage::Persisting);
}

#[scenario(path = "tests/features/ingestion.feature", index = 0)]
fn repeated_fetches_deduplicate(world: IngestionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ingestion.feature", index = 1)]
fn malformed_records_are_skipped(world: IngestionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ingestion.feature", index = 2)]
fn unusable_listing_is_rejected(world: IngestionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/ingestion.feature", index = 3)]
fn failed_save_recovers(world: IngestionWorld) {
    let _ = world;
}
