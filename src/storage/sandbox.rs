//! Path sandboxing
//!
//! Maps client path arguments onto the real filesystem below a fixed root.
//! Every resolved path is canonicalized and must be component-wise nested
//! under the canonical root; anything else is reported exactly like a
//! missing file.

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::StorageError;

/// Per-session view of the filesystem: a canonical root and the current
/// directory as a `/`-separated path relative to it.
#[derive(Debug, Clone)]
pub struct VirtualFs {
    root: PathBuf,
    current_dir: String,
}

impl VirtualFs {
    /// Fix the sandbox root. The home directory must exist and be a directory.
    pub fn new(home: &Path) -> Result<Self, StorageError> {
        let root = fs::canonicalize(home).map_err(|source| StorageError::InvalidRoot {
            path: home.to_path_buf(),
            source,
        })?;

        if !root.is_dir() {
            return Err(StorageError::InvalidRoot {
                path: home.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        Ok(Self {
            root,
            current_dir: "/".to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current directory as shown to the client, always starting with `/`.
    pub fn current_dir(&self) -> &str {
        &self.current_dir
    }

    pub fn is_at_root(&self) -> bool {
        self.current_dir == "/"
    }

    /// Real path of the current directory.
    pub fn current_real_dir(&self) -> PathBuf {
        let relative = self.current_dir.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Join an argument onto the root (absolute) or the current directory
    /// (relative) without touching the filesystem.
    fn candidate(&self, arg: &str) -> PathBuf {
        match arg.strip_prefix('/') {
            Some(rest) => self.root.join(rest.trim_start_matches('/')),
            None => self.current_real_dir().join(arg),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Resolve an argument naming an existing entry.
    pub fn resolve(&self, arg: &str) -> Result<PathBuf, StorageError> {
        let candidate = self.candidate(arg);
        let canonical =
            fs::canonicalize(&candidate).map_err(|_| StorageError::NotFound(arg.to_string()))?;

        if !self.contains(&canonical) {
            debug!("Rejected path outside sandbox: {}", canonical.display());
            return Err(StorageError::NotFound(arg.to_string()));
        }
        Ok(canonical)
    }

    /// Resolve an argument that may name an entry that does not exist yet.
    ///
    /// Missing leaves resolve through their canonical parent plus the plain
    /// final component. A leaf that is a dangling symlink is rejected.
    pub fn resolve_target(&self, arg: &str) -> Result<PathBuf, StorageError> {
        let candidate = self.candidate(arg);

        match fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() && fs::metadata(&candidate).is_err() => {
                debug!("Rejected dangling symlink: {}", candidate.display());
                Err(StorageError::NotFound(arg.to_string()))
            }
            Ok(_) => self.resolve(arg),
            Err(_) => {
                let not_found = || StorageError::NotFound(arg.to_string());

                let name = match candidate.components().next_back() {
                    Some(Component::Normal(name)) => name.to_os_string(),
                    _ => return Err(not_found()),
                };
                let parent = candidate.parent().ok_or_else(not_found)?;
                let parent = fs::canonicalize(parent).map_err(|_| not_found())?;

                if !self.contains(&parent) || !parent.is_dir() {
                    return Err(not_found());
                }
                Ok(parent.join(name))
            }
        }
    }

    /// Client-visible path of a real path inside the sandbox.
    pub fn virtual_path_of(&self, real: &Path) -> String {
        let relative = real.strip_prefix(&self.root).unwrap_or(Path::new(""));
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Change the current directory. On failure the current directory is
    /// left untouched.
    pub fn change_dir(&mut self, arg: &str) -> Result<(), StorageError> {
        let target = self.resolve(arg)?;
        if !target.is_dir() {
            return Err(StorageError::NotADirectory(arg.to_string()));
        }
        self.current_dir = self.virtual_path_of(&target);
        Ok(())
    }
}
