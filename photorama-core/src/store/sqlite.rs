//! SQLite-backed entity storage.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use chrono::NaiveDateTime;
use log::info;
use rusqlite::{Connection, ErrorCode, Transaction, params};
use url::Url;

use crate::{CacheKey, DATE_TAKEN_FORMAT, Photo, PhotoId, Tag, TagId};

use super::{ChangeBatch, EntityBackend, Snapshot, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS photos (
        cache_key TEXT PRIMARY KEY NOT NULL,
        photo_id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        remote_url TEXT NOT NULL,
        date_taken TEXT NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0,
        is_favorite INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS tags (
        tag_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS photo_tags (
        cache_key TEXT NOT NULL REFERENCES photos(cache_key) ON DELETE CASCADE,
        tag_id TEXT NOT NULL REFERENCES tags(tag_id) ON DELETE CASCADE,
        PRIMARY KEY (cache_key, tag_id)
    );
";

/// Backend persisting photos, tags and their links in SQLite.
///
/// Each [`ChangeBatch`] is written inside one transaction. A unique index on
/// `photo_id` rejects duplicate photos even if two views race.
pub struct SqliteBackend {
    location: Option<PathBuf>,
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open or create the database at `path`.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let location = path.as_ref().to_path_buf();
        let connection = Connection::open(&location).map_err(map_sqlite("open database"))?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(map_sqlite("enable write-ahead logging"))?;
        let backend = Self::initialise(connection, Some(location))?;
        info!("opened photo store at {}", path.as_ref().display());
        Ok(backend)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when SQLite cannot be initialised.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(map_sqlite("open database"))?;
        Self::initialise(connection, None)
    }

    fn initialise(connection: Connection, location: Option<PathBuf>) -> Result<Self, StoreError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(map_sqlite("enable foreign keys"))?;
        connection
            .execute_batch(SCHEMA)
            .map_err(map_sqlite("create schema"))?;
        Ok(Self {
            location,
            connection: Mutex::new(connection),
        })
    }

    /// Database file, or `None` when held in memory.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl EntityBackend for SqliteBackend {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let mut links = load_links(&connection)?;
        let mut photos = load_photos(&connection)?;
        for photo in &mut photos {
            if let Some(tags) = links.remove(&photo.cache_key) {
                photo.tags = tags.into_iter().collect();
            }
        }
        let tags = load_tags(&connection)?;
        Ok(Snapshot { photos, tags })
    }

    fn apply(&self, batch: &ChangeBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let transaction = connection
            .transaction()
            .map_err(map_sqlite("begin transaction"))?;
        insert_tags(&transaction, &batch.inserted_tags)?;
        insert_photos(&transaction, &batch.inserted_photos)?;
        update_photos(&transaction, &batch.updated_photos)?;
        for photo in batch.inserted_photos.iter().chain(&batch.updated_photos) {
            replace_links(&transaction, photo)?;
        }
        transaction.commit().map_err(map_sqlite("commit transaction"))
    }
}

fn map_sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| match source.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::ConstraintViolation {
            operation,
            message: source.to_string(),
        },
        _ => StoreError::io(operation, source),
    }
}

fn insert_tags(transaction: &Transaction<'_>, tags: &[Tag]) -> Result<(), StoreError> {
    let mut statement = transaction
        .prepare_cached("INSERT INTO tags (tag_id, name) VALUES (?1, ?2)")
        .map_err(map_sqlite("prepare tag insert"))?;
    for tag in tags {
        statement
            .execute(params![tag.tag_id.to_string(), tag.name])
            .map_err(map_sqlite("insert tag"))?;
    }
    Ok(())
}

fn insert_photos(transaction: &Transaction<'_>, photos: &[Photo]) -> Result<(), StoreError> {
    let mut statement = transaction
        .prepare_cached(
            "INSERT INTO photos
                (cache_key, photo_id, title, remote_url, date_taken, view_count, is_favorite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(map_sqlite("prepare photo insert"))?;
    for photo in photos {
        statement
            .execute(params![
                photo.cache_key.to_string(),
                photo.photo_id.as_str(),
                photo.title,
                photo.remote_url.as_str(),
                photo.date_taken_text(),
                i64::from(photo.view_count),
                photo.is_favorite,
            ])
            .map_err(map_sqlite("insert photo"))?;
    }
    Ok(())
}

fn update_photos(transaction: &Transaction<'_>, photos: &[Photo]) -> Result<(), StoreError> {
    let mut statement = transaction
        .prepare_cached("UPDATE photos SET view_count = ?2, is_favorite = ?3 WHERE cache_key = ?1")
        .map_err(map_sqlite("prepare photo update"))?;
    for photo in photos {
        let changed = statement
            .execute(params![
                photo.cache_key.to_string(),
                i64::from(photo.view_count),
                photo.is_favorite,
            ])
            .map_err(map_sqlite("update photo"))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "photo",
                key: photo.cache_key.to_string(),
            });
        }
    }
    Ok(())
}

fn replace_links(transaction: &Transaction<'_>, photo: &Photo) -> Result<(), StoreError> {
    let key = photo.cache_key.to_string();
    transaction
        .prepare_cached("DELETE FROM photo_tags WHERE cache_key = ?1")
        .and_then(|mut statement| statement.execute([&key]))
        .map_err(map_sqlite("clear photo tags"))?;
    let mut statement = transaction
        .prepare_cached("INSERT INTO photo_tags (cache_key, tag_id) VALUES (?1, ?2)")
        .map_err(map_sqlite("prepare photo tag insert"))?;
    for tag in &photo.tags {
        statement
            .execute(params![key, tag.to_string()])
            .map_err(map_sqlite("link tag"))?;
    }
    Ok(())
}

fn load_photos(connection: &Connection) -> Result<Vec<Photo>, StoreError> {
    let mut statement = connection
        .prepare(
            "SELECT cache_key, photo_id, title, remote_url, date_taken, view_count, is_favorite
             FROM photos ORDER BY rowid",
        )
        .map_err(map_sqlite("prepare photo load"))?;
    let rows = statement
        .query_map([], |row| {
            Ok(PhotoRow {
                cache_key: row.get(0)?,
                photo_id: row.get(1)?,
                title: row.get(2)?,
                remote_url: row.get(3)?,
                date_taken: row.get(4)?,
                view_count: row.get(5)?,
                is_favorite: row.get(6)?,
            })
        })
        .map_err(map_sqlite("load photos"))?;
    rows.map(|row| row.map_err(map_sqlite("read photo row"))?.into_photo())
        .collect()
}

fn load_tags(connection: &Connection) -> Result<Vec<Tag>, StoreError> {
    let mut statement = connection
        .prepare("SELECT tag_id, name FROM tags ORDER BY rowid")
        .map_err(map_sqlite("prepare tag load"))?;
    let rows = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(map_sqlite("load tags"))?;
    rows.map(|row| {
        let (id, name) = row.map_err(map_sqlite("read tag row"))?;
        Ok(Tag {
            tag_id: parse_tag_id(&id)?,
            name,
        })
    })
    .collect()
}

fn load_links(connection: &Connection) -> Result<HashMap<CacheKey, Vec<TagId>>, StoreError> {
    let mut statement = connection
        .prepare("SELECT cache_key, tag_id FROM photo_tags")
        .map_err(map_sqlite("prepare tag link load"))?;
    let rows = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(map_sqlite("load tag links"))?;
    let mut links: HashMap<CacheKey, Vec<TagId>> = HashMap::new();
    for row in rows {
        let (key, tag) = row.map_err(map_sqlite("read tag link row"))?;
        links
            .entry(parse_cache_key(&key)?)
            .or_default()
            .push(parse_tag_id(&tag)?);
    }
    Ok(links)
}

struct PhotoRow {
    cache_key: String,
    photo_id: String,
    title: String,
    remote_url: String,
    date_taken: String,
    view_count: i64,
    is_favorite: bool,
}

impl PhotoRow {
    fn into_photo(self) -> Result<Photo, StoreError> {
        let cache_key = parse_cache_key(&self.cache_key)?;
        let corrupt = |message: String| StoreError::Corrupt {
            entity: "photo",
            key: self.cache_key.clone(),
            message,
        };
        let remote_url = Url::parse(&self.remote_url)
            .map_err(|err| corrupt(format!("invalid remote URL: {err}")))?;
        let date_taken = NaiveDateTime::parse_from_str(&self.date_taken, DATE_TAKEN_FORMAT)
            .map_err(|err| corrupt(format!("invalid date taken: {err}")))?;
        let view_count = u32::try_from(self.view_count)
            .map_err(|_| corrupt(format!("view count {} out of range", self.view_count)))?;
        Ok(Photo {
            photo_id: PhotoId::new(self.photo_id),
            title: self.title,
            remote_url,
            date_taken,
            cache_key,
            view_count,
            is_favorite: self.is_favorite,
            tags: BTreeSet::new(),
        })
    }
}

fn parse_cache_key(text: &str) -> Result<CacheKey, StoreError> {
    text.parse().map_err(|err| StoreError::Corrupt {
        entity: "photo",
        key: text.to_owned(),
        message: format!("invalid cache key: {err}"),
    })
}

fn parse_tag_id(text: &str) -> Result<TagId, StoreError> {
    text.parse().map_err(|err| StoreError::Corrupt {
        entity: "tag",
        key: text.to_owned(),
        message: format!("invalid tag id: {err}"),
    })
}
