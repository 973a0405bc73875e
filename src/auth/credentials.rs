//! Credential storage
//!
//! Accounts live in `<ftp_home>/accounts.txt`, one per line:
//!
//! ```text
//! # user   password   [home directory]
//! alice    secret
//! bob      hunter2    /srv/shares/bob's files
//! ```
//!
//! The home directory is the rest of the line and defaults to
//! `<ftp_home>/home/<user>`. The file is re-read on every lookup so edits
//! take effect without a restart.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::auth::validator::is_valid_input;
use crate::error::AuthError;

/// A resolved account: the login and the directory it is sandboxed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
    pub home: PathBuf,
}

/// Credential lookup used by PASS.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when the user is unknown or the password is wrong.
    fn lookup(&self, user: &str, password: &str) -> Result<Option<Account>, AuthError>;
}

/// Flat-file credential store.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    ftp_home: PathBuf,
}

impl FileCredentialStore {
    pub fn new(ftp_home: impl Into<PathBuf>) -> Self {
        Self {
            ftp_home: ftp_home.into(),
        }
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.ftp_home.join("accounts.txt")
    }

    fn default_home(&self, login: &str) -> PathBuf {
        self.ftp_home.join("home").join(login)
    }

    fn home_for(&self, login: &str, rest: &str) -> PathBuf {
        let rest = rest.trim();
        if rest.is_empty() {
            return self.default_home(login);
        }
        let path = Path::new(rest);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.ftp_home.join(path)
        }
    }
}

/// Split off the first whitespace-delimited token.
fn next_token(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    match line.find(char::is_whitespace) {
        Some(end) => Some((&line[..end], &line[end..])),
        None => Some((line, "")),
    }
}

impl CredentialStore for FileCredentialStore {
    fn lookup(&self, user: &str, password: &str) -> Result<Option<Account>, AuthError> {
        if !is_valid_input(user) || !is_valid_input(password) {
            return Ok(None);
        }

        let path = self.accounts_file();
        let contents = fs::read_to_string(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => AuthError::CredentialFileMissing(path.clone()),
            _ => AuthError::CredentialFileUnreadable {
                path: path.clone(),
                source,
            },
        })?;

        for (number, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((login, rest)) = next_token(trimmed) else {
                continue;
            };
            let Some((secret, rest)) = next_token(rest) else {
                warn!(
                    "Skipping line {} of {}: expected `user password [home]`",
                    number + 1,
                    path.display()
                );
                continue;
            };

            if login != user || secret != password {
                continue;
            }

            let home = self.home_for(login, rest);
            if !home.is_dir() {
                fs::create_dir_all(&home).map_err(|_| AuthError::HomeUnavailable {
                    login: login.to_string(),
                    path: home.clone(),
                })?;
                info!("Created home directory {} for {}", home.display(), login);
            }

            return Ok(Some(Account {
                login: login.to_string(),
                home,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(accounts: &str) -> (tempfile::TempDir, FileCredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("accounts.txt"), accounts).unwrap();
        let store = FileCredentialStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn valid_login_gets_default_home_created() {
        let (dir, store) = store_with("# comment\n\nalice secret\n");
        let account = store.lookup("alice", "secret").unwrap().unwrap();

        assert_eq!(account.login, "alice");
        assert_eq!(account.home, dir.path().join("home").join("alice"));
        assert!(account.home.is_dir());
    }

    #[test]
    fn home_is_the_rest_of_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("shared files");
        fs::write(
            dir.path().join("accounts.txt"),
            format!("bob pw   {}  \n", custom.display()),
        )
        .unwrap();
        let store = FileCredentialStore::new(dir.path());

        let account = store.lookup("bob", "pw").unwrap().unwrap();
        assert_eq!(account.home, custom);
        assert!(custom.is_dir());
    }

    #[test]
    fn wrong_password_and_unknown_user_are_none() {
        let (_dir, store) = store_with("alice secret\n");
        assert_eq!(store.lookup("alice", "nope").unwrap(), None);
        assert_eq!(store.lookup("mallory", "secret").unwrap(), None);
        assert_eq!(store.lookup("alice", "").unwrap(), None);
    }

    #[test]
    fn short_lines_are_skipped() {
        let (_dir, store) = store_with("lonely\nalice secret\n");
        assert_eq!(store.lookup("lonely", "x").unwrap(), None);
        assert!(store.lookup("alice", "secret").unwrap().is_some());
    }

    #[test]
    fn edits_are_picked_up_without_restart() {
        let (dir, store) = store_with("alice old\n");
        assert!(store.lookup("alice", "new").unwrap().is_none());
        fs::write(dir.path().join("accounts.txt"), "alice new\n").unwrap();
        assert!(store.lookup("alice", "new").unwrap().is_some());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(matches!(
            store.lookup("alice", "secret"),
            Err(AuthError::CredentialFileMissing(_))
        ));
    }
}
