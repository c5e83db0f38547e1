//! Filesystem helpers for scratch and output files.

use nix::errno::Errno;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Move `src` to `dst`, creating the destination directory.
///
/// Renames when possible. Across filesystems the file is copied next to
/// `dst` first and renamed into place, then the source is removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(Errno::EXDEV as i32) => {
            debug!(src = %src.display(), dst = %dst.display(), "Cross-device move, copying");
            let staged = dst.with_extension("partial");
            if let Err(e) = fs::copy(src, &staged).await {
                remove_quietly(&staged).await;
                return Err(e.into());
            }
            if let Err(e) = fs::rename(&staged, dst).await {
                remove_quietly(&staged).await;
                return Err(e.into());
            }
            remove_quietly(src).await;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create the parent directory of `path` if it is missing.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Best-effort delete. Missing files are fine.
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Size in bytes, 0 when the file cannot be read.
pub async fn file_size(path: &Path) -> u64 {
    fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}
