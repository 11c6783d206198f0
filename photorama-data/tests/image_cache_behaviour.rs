//! Behavioural tests for image caching through the photo service.

use std::{cell::RefCell, io::Cursor, sync::Arc};

use camino::Utf8PathBuf;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photorama_core::{EntityStore, Photo, test_support::new_photo};
use photorama_data::{
    FlickrApi, ImageCache, ImageCacheConfig, PhotoService,
    flickr::DEFAULT_ENDPOINT,
    transport::test_support::{StubResponse, StubTransport},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

type Service = PhotoService<Arc<StubTransport>>;

/// Shared state for image cache scenarios.
struct CacheWorld {
    temp_dir: TempDir,
    transport: Arc<StubTransport>,
    store: Arc<EntityStore>,
    service: RefCell<Option<Service>>,
    photo: RefCell<Option<Photo>>,
}

impl CacheWorld {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
            transport: Arc::new(StubTransport::new()),
            store: Arc::new(EntityStore::in_memory().expect("open store")),
            service: RefCell::new(None),
            photo: RefCell::new(None),
        }
    }

    fn open_service(&self) {
        let directory = Utf8PathBuf::from_path_buf(self.temp_dir.path().join("images"))
            .expect("utf-8 path");
        let images = ImageCache::open(&ImageCacheConfig::new(directory)).expect("open cache");
        let api = FlickrApi::new(DEFAULT_ENDPOINT, "behaviour-key").expect("valid api");
        self.service.replace(Some(PhotoService::new(
            api,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            Arc::new(images),
        )));
    }

    fn with_service<T>(&self, f: impl FnOnce(&Service) -> T) -> T {
        let borrowed = self.service.borrow();
        f(borrowed.as_ref().expect("service should be open"))
    }

    fn photo(&self) -> Photo {
        self.photo.borrow().clone().expect("a photo should be stored")
    }

    fn request_image(&self) {
        let photo = self.photo();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        self.with_service(|service| runtime.block_on(service.fetch_image(&photo)))
            .expect("image available");
    }
}

#[fixture]
fn world() -> CacheWorld {
    CacheWorld::new()
}

#[given("a photo service with one stored photo")]
fn stored_photo(world: &CacheWorld) {
    let photo = world
        .store
        .write_view()
        .insert_photo(new_photo("31337", "2024-07-14 18:30:00"))
        .expect("insert photo");
    world.store.save_changes().expect("save photo");
    world.photo.replace(Some(photo));
    world.open_service();
}

#[given("the image host serves a picture for it")]
fn host_serves_picture(world: &CacheWorld) {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([30, 90, 160])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    world
        .transport
        .route(world.photo().remote_url.as_str(), StubResponse::Body(bytes));
}

#[when("the image is requested")]
fn request_once(world: &CacheWorld) {
    world.request_image();
}

#[when("the image is requested twice")]
fn request_twice(world: &CacheWorld) {
    world.request_image();
    world.request_image();
}

#[when("the image cache is reopened")]
fn reopen_cache(world: &CacheWorld) {
    world.open_service();
}

#[then("the image host was asked once")]
fn host_asked_once(world: &CacheWorld) {
    assert_eq!(
        world.transport.request_count(world.photo().remote_url.as_str()),
        1
    );
}

#[then("the second request was served from memory")]
fn served_from_memory(world: &CacheWorld) {
    let stats = world.with_service(|service| service.images().stats());
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.disk_reads, 1, "only the first miss consults the disk");
}

#[then("the disk tier answered one lookup")]
fn disk_answered(world: &CacheWorld) {
    let stats = world.with_service(|service| service.images().stats());
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.memory_hits, 0);
}

#[scenario(path = "tests/features/image_cache.feature", index = 0)]
fn cached_images_skip_the_network(world: CacheWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/image_cache.feature", index = 1)]
fn restarted_cache_reads_disk(world: CacheWorld) {
    let _ = world;
}
