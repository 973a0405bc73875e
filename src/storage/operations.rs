//! Storage operations
//!
//! Filesystem mutations and metadata queries for MKD, DELE, RMD, RNTO,
//! SIZE and MDTM. All paths go through the session's `VirtualFs`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;

use crate::error::StorageError;
use crate::storage::sandbox::VirtualFs;

/// Create one directory level. Returns the real path created.
pub fn make_directory(vfs: &VirtualFs, arg: &str) -> Result<PathBuf, StorageError> {
    let target = vfs.resolve_target(arg)?;
    fs::create_dir(&target)?;
    info!("Created directory {}", target.display());
    Ok(target)
}

/// Delete a regular file.
pub fn delete_file(vfs: &VirtualFs, arg: &str) -> Result<(), StorageError> {
    let path = vfs.resolve(arg)?;
    if !path.is_file() {
        return Err(StorageError::NotAFile(arg.to_string()));
    }
    fs::remove_file(&path)?;
    info!("Deleted file {}", path.display());
    Ok(())
}

/// Remove an empty directory. The sandbox root itself cannot be removed.
pub fn remove_directory(vfs: &VirtualFs, arg: &str) -> Result<(), StorageError> {
    let path = vfs.resolve(arg)?;
    if !path.is_dir() {
        return Err(StorageError::NotADirectory(arg.to_string()));
    }
    if path == vfs.root() {
        return Err(StorageError::NotFound(arg.to_string()));
    }

    let entries = fs::read_dir(&path)?.count();
    if entries > 0 {
        return Err(StorageError::DirectoryNotEmpty {
            path: arg.to_string(),
            entries,
        });
    }

    fs::remove_dir(&path)?;
    info!("Removed directory {}", path.display());
    Ok(())
}

/// Rename an already resolved source to a destination argument.
pub fn rename_path(vfs: &VirtualFs, from: &Path, to_arg: &str) -> Result<PathBuf, StorageError> {
    let target = vfs.resolve_target(to_arg)?;
    fs::rename(from, &target)?;
    info!("Renamed {} to {}", from.display(), target.display());
    Ok(target)
}

/// Size in bytes of a regular file.
pub fn file_size(vfs: &VirtualFs, arg: &str) -> Result<u64, StorageError> {
    let path = vfs.resolve(arg)?;
    let meta = fs::metadata(&path)?;
    if !meta.is_file() {
        return Err(StorageError::NotAFile(arg.to_string()));
    }
    Ok(meta.len())
}

/// Last modification time as `YYYYMMDDhhmmss` in UTC.
pub fn modification_time(vfs: &VirtualFs, arg: &str) -> Result<String, StorageError> {
    let path = vfs.resolve(arg)?;
    let modified = fs::metadata(&path)?.modified()?;
    Ok(format_mdtm(DateTime::<Utc>::from(modified)))
}

pub fn format_mdtm(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M%S").to_string()
}
