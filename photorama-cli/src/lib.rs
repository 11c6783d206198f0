//! Command-line interface for browsing and organising Flickr photos.
#![forbid(unsafe_code)]

use std::{
    io::{self, Write},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use log::debug;
use photorama_core::{
    EntityStore, Photo, PhotoField, PhotoId, PhotoPredicate, PhotoQuery, PhotoSortKey, Tag,
};
use photorama_data::{ApiMethod, HttpTransport, ImageCache, PhotoService, Transport};
use tokio::runtime::Runtime;

mod config;
mod error;
mod output;

use config::{AppConfig, ServiceArgs};
pub use error::CliError;
use output::{write_json, write_line, write_photo_lines, write_tag_lines};

/// Run the Photorama CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let config = cli.service.into_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let service = open_service(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli.command, cli.json, &service, &runtime, &mut out)
}

fn open_service(config: &AppConfig) -> Result<PhotoService<HttpTransport>, CliError> {
    photorama_fs::open_or_create_dir(&config.data_dir).map_err(|source| {
        CliError::PrepareDataDir {
            path: config.data_dir.clone(),
            source,
        }
    })?;
    let database = config.database_path();
    let store = EntityStore::open(&database).map_err(|source| CliError::OpenStore {
        path: database.clone(),
        source,
    })?;
    let images = ImageCache::open(&config.cache_config())?;
    let transport =
        HttpTransport::new(config.transport.clone()).map_err(CliError::BuildTransport)?;
    debug!("opened photo data in {}", config.data_dir);
    Ok(PhotoService::new(
        config.flickr_api()?,
        transport,
        Arc::new(store),
        Arc::new(images),
    ))
}

#[derive(Debug, Parser)]
#[command(
    name = "photorama",
    about = "Browse, tag and cache Flickr photos from the terminal",
    version
)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,
    /// Print JSON instead of tab-separated text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch the most recent public photos and list the library.
    Recent,
    /// Search public photos by keyword and list the library.
    Search {
        /// Free-text keyword.
        keyword: String,
    },
    /// List stored photos, oldest first.
    List {
        /// Only list favourites.
        #[arg(long)]
        favorites: bool,
        /// Only list photos carrying this tag.
        #[arg(long, value_name = "name")]
        tag: Option<String>,
    },
    /// Count a view of a photo and make sure its image is cached.
    Open {
        /// Flickr photo identifier.
        photo_id: String,
    },
    /// Toggle the favourite flag of a photo.
    Favorite {
        /// Flickr photo identifier.
        photo_id: String,
    },
    /// List tags by name.
    Tags,
    /// Create, attach or detach tags.
    #[command(subcommand)]
    Tag(TagCommand),
}

#[derive(Debug, Clone, Subcommand)]
enum TagCommand {
    /// Create a tag.
    Create {
        /// Tag name.
        name: String,
    },
    /// Attach a tag to a photo.
    Add {
        /// Flickr photo identifier.
        photo_id: String,
        /// Tag name.
        name: String,
    },
    /// Detach a tag from a photo.
    Remove {
        /// Flickr photo identifier.
        photo_id: String,
        /// Tag name.
        name: String,
    },
}

fn execute<T: Transport>(
    command: &Command,
    json: bool,
    service: &PhotoService<T>,
    runtime: &Runtime,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Recent => {
            let photos = runtime.block_on(service.fetch_photos(ApiMethod::RecentPhotos, None))?;
            print_photos(service, &photos, json, out)
        }
        Command::Search { keyword } => {
            let photos =
                runtime.block_on(service.fetch_photos(ApiMethod::Search, Some(keyword.as_str())))?;
            print_photos(service, &photos, json, out)
        }
        Command::List { favorites, tag } => {
            let query = library_query(service, *favorites, tag.as_deref())?;
            print_photos(service, &service.photos(&query), json, out)
        }
        Command::Open { photo_id } => {
            let photo = find_photo(service, photo_id)?;
            let opened = service.open_photo(&photo.cache_key)?;
            let image = runtime.block_on(service.fetch_image(&opened))?;
            if json {
                return write_json(out, &opened);
            }
            print_photos(service, std::slice::from_ref(&opened), json, out)?;
            let path = service.images().path_for(&opened.cache_key);
            write_line(
                out,
                &format!("image\t{}x{}\t{path}", image.width(), image.height()),
            )
        }
        Command::Favorite { photo_id } => {
            let photo = find_photo(service, photo_id)?;
            let updated = service.toggle_favorite(&photo.cache_key)?;
            print_photos(service, std::slice::from_ref(&updated), json, out)
        }
        Command::Tags => print_tags(&service.fetch_tags(), json, out),
        Command::Tag(TagCommand::Create { name }) => {
            let tag = service.create_tag(name)?;
            print_tags(std::slice::from_ref(&tag), json, out)
        }
        Command::Tag(TagCommand::Add { photo_id, name }) => {
            let photo = find_photo(service, photo_id)?;
            let tag = find_tag(service, name)?;
            let updated = service.add_tag_to_photo(&photo.cache_key, &tag.tag_id)?;
            print_photos(service, std::slice::from_ref(&updated), json, out)
        }
        Command::Tag(TagCommand::Remove { photo_id, name }) => {
            let photo = find_photo(service, photo_id)?;
            let tag = find_tag(service, name)?;
            let updated = service.remove_tag_from_photo(&photo.cache_key, &tag.tag_id)?;
            print_photos(service, std::slice::from_ref(&updated), json, out)
        }
    }
}

fn library_query<T: Transport>(
    service: &PhotoService<T>,
    favorites: bool,
    tag: Option<&str>,
) -> Result<PhotoQuery, CliError> {
    let mut predicates = Vec::new();
    if favorites {
        predicates.push(PhotoPredicate::IsFavorite(true));
    }
    if let Some(name) = tag {
        predicates.push(PhotoPredicate::HasTag(find_tag(service, name)?.tag_id));
    }
    let query = PhotoQuery::all().sorted_by(PhotoSortKey::ascending(PhotoField::DateTaken));
    Ok(if predicates.is_empty() {
        query
    } else {
        query.with_predicate(PhotoPredicate::All(predicates))
    })
}

fn find_photo<T: Transport>(service: &PhotoService<T>, photo_id: &str) -> Result<Photo, CliError> {
    service
        .store()
        .read_view()
        .photo_by_id(&PhotoId::new(photo_id))
        .ok_or_else(|| CliError::UnknownPhoto {
            photo_id: photo_id.to_owned(),
        })
}

fn find_tag<T: Transport>(service: &PhotoService<T>, name: &str) -> Result<Tag, CliError> {
    let wanted = name.trim();
    service
        .fetch_tags()
        .into_iter()
        .find(|tag| tag.name == wanted)
        .ok_or_else(|| CliError::UnknownTag {
            name: name.to_owned(),
        })
}

fn print_photos<T: Transport>(
    service: &PhotoService<T>,
    photos: &[Photo],
    json: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    if json {
        write_json(out, photos)
    } else {
        write_photo_lines(out, photos, &service.fetch_tags())
    }
}

fn print_tags(tags: &[Tag], json: bool, out: &mut dyn Write) -> Result<(), CliError> {
    if json {
        write_json(out, tags)
    } else {
        write_tag_lines(out, tags)
    }
}

#[cfg(test)]
mod tests;
