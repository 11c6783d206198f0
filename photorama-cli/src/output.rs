//! Text and JSON rendering of command results.

use std::{collections::BTreeMap, io::Write};

use photorama_core::{Photo, Tag, TagId};
use serde::Serialize;

use crate::CliError;

pub(crate) fn write_json<T: Serialize + ?Sized>(
    out: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(CliError::SerializeOutput)?;
    writeln!(out).map_err(CliError::WriteOutput)
}

/// One line per photo: identifier, date taken, views, favourite marker,
/// title and tag names.
pub(crate) fn write_photo_lines(
    out: &mut dyn Write,
    photos: &[Photo],
    tags: &[Tag],
) -> Result<(), CliError> {
    let names: BTreeMap<TagId, &str> = tags
        .iter()
        .map(|tag| (tag.tag_id, tag.name.as_str()))
        .collect();
    for photo in photos {
        let labels: Vec<&str> = photo
            .tags
            .iter()
            .filter_map(|id| names.get(id).copied())
            .collect();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            photo.photo_id,
            photo.date_taken_text(),
            photo.view_count,
            if photo.is_favorite { "*" } else { "-" },
            photo.title,
            labels.join(",")
        )
        .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}

pub(crate) fn write_tag_lines(out: &mut dyn Write, tags: &[Tag]) -> Result<(), CliError> {
    for tag in tags {
        writeln!(out, "{}\t{}", tag.tag_id, tag.name).map_err(CliError::WriteOutput)?;
    }
    Ok(())
}

pub(crate) fn write_line(out: &mut dyn Write, line: &str) -> Result<(), CliError> {
    writeln!(out, "{line}").map_err(CliError::WriteOutput)
}
