//! Filesystem primitives used by the materializer.
//!
//! Thin wrappers over `tokio::fs` that attach the failing path to every error.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::errors::{DsmError, Result};

pub(crate) async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| DsmError::filesystem(e, "Failed to create directory", path))
}

pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DsmError::filesystem(e, "Failed to write file", path))
}

/// Remove a directory tree; a missing directory is not an error.
pub(crate) async fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DsmError::filesystem(e, "Failed to remove directory", path)),
    }
}

/// Remove whatever sits at `path` without following symlinks.
pub(crate) async fn remove_entry(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DsmError::filesystem(e, "Failed to inspect entry", path)),
    };

    if metadata.is_dir() {
        return remove_dir_all_if_exists(path).await;
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DsmError::filesystem(e, "Failed to remove file", path)),
    }
}

/// Whether `path` is itself a symlink.
pub(crate) async fn is_symlink(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => Ok(metadata.file_type().is_symlink()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DsmError::filesystem(e, "Failed to inspect entry", path)),
    }
}

/// Target of the symlink at `path`, or `None` when there is no symlink.
pub(crate) async fn read_link_if_exists(path: &Path) -> Result<Option<PathBuf>> {
    match tokio::fs::read_link(path).await {
        Ok(target) => Ok(Some(target)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => Ok(None),
        Err(e) => Err(DsmError::filesystem(e, "Failed to read symlink", path)),
    }
}

/// Create a directory symlink at `link` pointing to the relative `target`.
pub(crate) async fn symlink_dir(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = tokio::fs::symlink(target, link).await;
    #[cfg(windows)]
    let result = tokio::fs::symlink_dir(target, link).await;

    result.map_err(|e| {
        DsmError::filesystem(e, format!("Failed to link to {}", target.display()), link)
    })
}

pub(crate) async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| DsmError::filesystem(e, format!("Failed to rename to {}", to.display()), from))
}

/// Names of the entries directly inside `dir`.
pub(crate) async fn list_names(dir: &Path) -> Result<Vec<OsString>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DsmError::filesystem(e, "Failed to list directory", dir))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DsmError::filesystem(e, "Failed to list directory", dir))?
    {
        names.push(entry.file_name());
    }
    Ok(names)
}
