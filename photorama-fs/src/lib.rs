//! Capability-based filesystem helpers built on `cap-std` and `camino`.
//!
//! Directories are opened once with ambient authority and every later file
//! operation is resolved relative to the returned [`fs_utf8::Dir`].
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Suffix appended to a file name while it is being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Create `path` and any missing ancestors, then open it.
///
/// # Errors
///
/// Returns the I/O error raised while creating or opening the directory.
pub fn open_or_create_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (root, relative) = split_ambient_root(path)?;
    if relative.as_str().is_empty() {
        return Ok(root);
    }
    root.create_dir_all(&relative)?;
    root.open_dir(&relative)
}

/// Write `contents` to `name` inside `dir` so readers never see a torn file.
///
/// The bytes go to a sibling file carrying [`PARTIAL_SUFFIX`], which is then
/// renamed over `name`. On failure the partial file is removed.
///
/// # Errors
///
/// Returns the I/O error raised by the write or the rename.
pub fn write_atomically(dir: &fs_utf8::Dir, name: &str, contents: &[u8]) -> io::Result<()> {
    let partial = format!("{name}{PARTIAL_SUFFIX}");
    let outcome = dir
        .write(&partial, contents)
        .and_then(|()| dir.rename(&partial, dir, name));
    if outcome.is_err() {
        // Best effort: the original error is the one worth reporting.
        drop(dir.remove_file(&partial));
    }
    outcome
}

/// Read `name` from `dir`, mapping a missing file to `None`.
///
/// # Errors
///
/// Returns any I/O error other than [`io::ErrorKind::NotFound`].
pub fn read_if_exists(dir: &fs_utf8::Dir, name: &str) -> io::Result<Option<Vec<u8>>> {
    match dir.read(name) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Remove `name` from `dir`. Returns whether a file was removed.
///
/// # Errors
///
/// Returns any I/O error other than [`io::ErrorKind::NotFound`].
pub fn remove_if_exists(dir: &fs_utf8::Dir, name: &str) -> io::Result<bool> {
    match dir.remove_file(name) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Split `path` into an opened ambient root and the remainder below it.
///
/// Absolute paths are rooted at `/` or at their Windows drive prefix.
/// Relative paths are rooted at the current directory.
///
/// # Errors
///
/// Returns an error when the root cannot be opened or the path is not UTF-8
/// after stripping its prefix.
pub fn split_ambient_root(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let (root, remainder) = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix_text = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let root = Utf8PathBuf::from(prefix_text).join(std::path::MAIN_SEPARATOR_STR);
            let remainder = std_path
                .strip_prefix(root.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip drive prefix"))?;
            (root, remainder)
        }
        Some(Component::RootDir) => {
            let root = Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR);
            let remainder = std_path
                .strip_prefix(root.as_std_path())
                .map_err(|_| io::Error::other("failed to strip filesystem root"))?;
            (root, remainder)
        }
        _ => (Utf8PathBuf::from("."), std_path),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(remainder.to_path_buf())
        .map_err(|_| io::Error::other("non-UTF-8 path"))?;
    Ok((dir, relative))
}
