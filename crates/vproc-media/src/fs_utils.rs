//! Filesystem helpers for placing files atomically.
//!
//! Files are written to a uniquely named sibling first and renamed into
//! place, so readers never observe a partially written destination.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Unique temporary sibling of `dst` on the same filesystem.
pub fn temp_sibling(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Copy `src` to `dst` through a temporary sibling, then rename.
///
/// Returns the number of bytes copied.
pub async fn copy_atomic(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !fs::try_exists(src).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    ensure_parent(dst).await?;

    let tmp = temp_sibling(dst);
    let bytes = match fs::copy(src, &tmp).await {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }
    };
    commit(&tmp, dst).await?;
    Ok(bytes)
}

/// Rename a fully written temporary file onto `dst`, removing it on failure.
pub async fn commit(tmp: &Path, dst: &Path) -> MediaResult<()> {
    if let Err(e) = fs::rename(tmp, dst).await {
        tracing::error!(
            "Failed to rename temp file into place: {} -> {}: {}",
            tmp.display(),
            dst.display(),
            e
        );
        remove_quietly(tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Remove a file, logging instead of failing.
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Size of a file in bytes.
pub async fn file_size(path: &Path) -> MediaResult<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
