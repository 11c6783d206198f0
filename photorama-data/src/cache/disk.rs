//! Disk tier: one JPEG file per cache key.

use std::{
    io,
    sync::atomic::{AtomicU64, Ordering},
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};
use log::warn;
use photorama_core::CacheKey;
use photorama_fs::{open_or_create_dir, read_if_exists, remove_if_exists, write_atomically};

use super::JPEG_QUALITY;

pub(super) struct DiskTier {
    root: Utf8PathBuf,
    dir: fs_utf8::Dir,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl DiskTier {
    pub(super) fn open(root: &Utf8Path) -> io::Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            dir: open_or_create_dir(root)?,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn file_name(key: &CacheKey) -> String {
        format!("{key}.jpg")
    }

    pub(super) fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub(super) fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Decode the stored image, treating unreadable files as absent.
    pub(super) fn load(&self, key: &CacheKey) -> Option<DynamicImage> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let name = Self::file_name(key);
        let bytes = match read_if_exists(&self.dir, &name) {
            Ok(bytes) => bytes?,
            Err(err) => {
                warn!("failed to read cached image {}: {err}", self.root.join(&name));
                return None;
            }
        };
        match image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg) {
            Ok(image) => Some(image),
            Err(err) => {
                warn!("ignoring undecodable cached image {}: {err}", self.root.join(&name));
                None
            }
        }
    }

    pub(super) fn store(&self, key: &CacheKey, image: &DynamicImage) {
        let name = Self::file_name(key);
        let outcome = encode_jpeg(image)
            .map_err(io::Error::other)
            .and_then(|bytes| write_atomically(&self.dir, &name, &bytes));
        match outcome {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => warn!("failed to write cached image {}: {err}", self.root.join(&name)),
        }
    }

    pub(super) fn remove(&self, key: &CacheKey) {
        let name = Self::file_name(key);
        if let Err(err) = remove_if_exists(&self.dir, &name) {
            warn!("failed to remove cached image {}: {err}", self.root.join(&name));
        }
    }
}

fn encode_jpeg(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&image.to_rgb8())?;
    Ok(bytes)
}
