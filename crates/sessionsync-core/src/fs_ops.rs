use crate::error::SyncError;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy one file and carry the source modification time over, so later
/// time comparisons see the copy as exactly as fresh as its source.
pub fn copy_file(source: &Path, destination: &Path) -> Result<u64, SyncError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    make_writable(destination)?;
    let bytes = fs::copy(source, destination).map_err(|e| SyncError::io(source, e))?;
    let metadata = fs::metadata(source).map_err(|e| SyncError::io(source, e))?;
    filetime::set_file_mtime(destination, FileTime::from_last_modification_time(&metadata))
        .map_err(|e| SyncError::io(destination, e))?;
    Ok(bytes)
}

/// `fs::copy` carries permissions over, so an earlier copy of a read-only
/// source would otherwise refuse to be overwritten.
fn make_writable(path: &Path) -> Result<(), SyncError> {
    let Ok(metadata) = fs::metadata(path) else {
        return Ok(());
    };
    let mut permissions = metadata.permissions();
    if !metadata.is_file() || !permissions.readonly() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).map_err(|e| SyncError::io(path, e))
}

/// Recursively copy `source` into `destination`, overwriting files that exist.
/// Symlinks inside the tree are followed.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<u64, SyncError> {
    fs::create_dir_all(destination).map_err(|e| SyncError::io(destination, e))?;
    let mut total = 0;
    for entry in WalkDir::new(source).follow_links(true).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            SyncError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| SyncError::io(&target, e))?;
        } else {
            total += copy_file(entry.path(), &target)?;
        }
    }
    Ok(total)
}

pub fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

pub fn create_symlink(destination: &Path, link: &Path) -> Result<(), SyncError> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(destination, link).map_err(|e| SyncError::io(link, e))
    }
    #[cfg(windows)]
    {
        if destination.is_dir() {
            std::os::windows::fs::symlink_dir(destination, link)
                .map_err(|e| SyncError::io(link, e))
        } else {
            std::os::windows::fs::symlink_file(destination, link)
                .map_err(|e| SyncError::io(link, e))
        }
    }
}

/// Remove a symlink without touching what it points to.
pub fn remove_symlink(link: &Path) -> Result<(), SyncError> {
    #[cfg(windows)]
    {
        if fs::remove_dir(link).is_ok() {
            return Ok(());
        }
    }
    fs::remove_file(link).map_err(|e| SyncError::io(link, e))
}

pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

/// Absolute form of a symlink's immediate target, relative targets resolved
/// against the link's parent directory. `None` when `link` is not a symlink.
pub fn link_target(link: &Path) -> Option<PathBuf> {
    let target = fs::read_link(link).ok()?;
    if target.is_absolute() {
        Some(target)
    } else {
        Some(link.parent().unwrap_or_else(|| Path::new("/")).join(target))
    }
}
