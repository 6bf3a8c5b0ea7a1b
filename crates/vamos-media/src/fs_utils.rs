//! Filesystem utilities for job working directories.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Delete everything under `dir` except the direct child named `keep`.
///
/// Returns the number of top-level entries removed.
pub async fn retain_only(dir: impl AsRef<Path>, keep: &str) -> MediaResult<usize> {
    let dir = dir.as_ref();
    let mut removed = 0;

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_str() == Some(keep) {
            continue;
        }

        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        tracing::debug!("Removed intermediate artifact: {}", path.display());
        removed += 1;
    }

    Ok(removed)
}

/// Remove a directory if it is empty. Returns whether it was removed.
pub async fn remove_dir_if_empty(dir: impl AsRef<Path>) -> MediaResult<bool> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await?;
    if entries.next_entry().await?.is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).await?;
    Ok(true)
}
