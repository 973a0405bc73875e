//! Directory listing
//!
//! Produces `ls -l` style lines for the current directory:
//! `drwxrwxrwx   2 NOBODY  NOBODY 4096 Mar 07 14:02 name`.

use std::fs::{self, Metadata};
use std::path::Path;

use chrono::{DateTime, Duration, Local};

use crate::error::StorageError;
use crate::storage::sandbox::VirtualFs;

/// Entries older than this show the year instead of the time of day.
const RECENT_WINDOW_DAYS: i64 = 180;

/// List the current directory: `.`, then `..` unless at the root, then the
/// children sorted by name.
pub fn list_current(vfs: &VirtualFs, now: DateTime<Local>) -> Result<Vec<String>, StorageError> {
    let dir = vfs.current_real_dir();
    let mut lines = Vec::new();

    lines.push(format_entry(".", &fs::metadata(&dir)?, now));
    if !vfs.is_at_root() {
        if let Some(parent) = dir.parent() {
            lines.push(format_entry("..", &fs::metadata(parent)?, now));
        }
    }

    let mut children: Vec<(String, Metadata)> = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry_metadata(&entry.path()) {
            Some(meta) => children.push((name, meta)),
            None => log::debug!("Skipping unreadable entry {name}"),
        }
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));

    lines.extend(
        children
            .iter()
            .map(|(name, meta)| format_entry(name, meta, now)),
    );
    Ok(lines)
}

/// Follow symlinks; a dangling link still lists with its own metadata.
fn entry_metadata(path: &Path) -> Option<Metadata> {
    fs::metadata(path)
        .or_else(|_| fs::symlink_metadata(path))
        .ok()
}

/// Format a single listing line.
pub fn format_entry(name: &str, meta: &Metadata, now: DateTime<Local>) -> String {
    let is_dir = meta.is_dir();
    let triple = format!(
        "r{}{}",
        if meta.permissions().readonly() { '-' } else { 'w' },
        if is_dir || is_executable(meta) { 'x' } else { '-' },
    );
    let modified = meta
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or(now);

    format!(
        "{}{}{}{}   {} NOBODY  NOBODY {} {} {}",
        if is_dir { 'd' } else { '-' },
        triple,
        triple,
        triple,
        if is_dir { 2 } else { 1 },
        meta.len(),
        format_list_time(modified, now),
        name
    )
}

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &Metadata) -> bool {
    false
}

/// `Mon DD HH:MM` for entries modified within the last 180 days (or in the
/// future), `Mon DD  YYYY` otherwise.
pub fn format_list_time(modified: DateTime<Local>, now: DateTime<Local>) -> String {
    if now.signed_duration_since(modified) <= Duration::days(RECENT_WINDOW_DAYS) {
        modified.format("%b %d %H:%M").to_string()
    } else {
        modified.format("%b %d  %Y").to_string()
    }
}
