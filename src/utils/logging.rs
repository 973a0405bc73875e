//! Logging utilities
//!
//! Process-wide logging goes through `env_logger`. Each session also keeps
//! an append-only transcript in `<ftp_home>/logs`, moved into a per-user
//! directory once the client logs in.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use env_logger::{Builder, Env};
use log::{error, info, warn};

use crate::auth::validator::sanitize_login;

/// Setup logging for the server. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(buf, "[{}] [{}] {}", timestamp, record.level(), record.args())
        })
        .init();
}

/// Tag of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Recv,
    Send,
    Info,
    Warning,
    Error,
}

impl Tag {
    fn as_str(&self) -> &'static str {
        match self {
            Tag::Recv => "RECV",
            Tag::Send => "SEND",
            Tag::Info => "INFO",
            Tag::Warning => "WARNING",
            Tag::Error => "ERROR",
        }
    }
}

/// Per-session transcript. Every entry is mirrored to the `log` facade;
/// when logging is disabled only the mirror remains.
#[derive(Debug)]
pub struct SessionLog {
    id: String,
    dir: Option<PathBuf>,
    file: Option<PathBuf>,
    write_failed: bool,
}

impl SessionLog {
    /// Start a transcript named `YYYYMMDD.HHMMSS_<id>.txt` in `dir`.
    pub fn new(id: &str, dir: Option<&Path>) -> Self {
        let id = id.replace(':', "_");
        let file = dir.map(|dir| {
            dir.join(format!(
                "{}_{}.txt",
                Local::now().format("%Y%m%d.%H%M%S"),
                id
            ))
        });

        if let Some(dir) = dir {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("Cannot create log directory {}: {}", dir.display(), e);
            }
        }

        Self {
            id,
            dir: dir.map(Path::to_path_buf),
            file,
            write_failed: false,
        }
    }

    /// A log that only mirrors to the process logger.
    pub fn disabled(id: &str) -> Self {
        Self::new(id, None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Move the transcript into `<dir>/<login>/` and tag later lines with
    /// the login.
    pub fn set_user(&mut self, login: &str) {
        let login = sanitize_login(login);
        if let (Some(dir), Some(current)) = (self.dir.clone(), self.file.clone()) {
            if let Some(name) = current.file_name() {
                let user_dir = dir.join(&login);
                let target = user_dir.join(name);
                let result = fs::create_dir_all(&user_dir).and_then(|()| {
                    if current.exists() {
                        fs::rename(&current, &target)
                    } else {
                        Ok(())
                    }
                });
                match result {
                    Ok(()) => self.file = Some(target),
                    Err(e) => warn!("Cannot move session log to {}: {}", target.display(), e),
                }
            }
        }
        self.id = login;
    }

    pub fn received(&mut self, line: &str) {
        info!("[{}] <- {}", self.id, line.trim());
        self.append(Tag::Recv, line);
    }

    pub fn sent(&mut self, line: &str) {
        info!("[{}] -> {}", self.id, line.trim());
        self.append(Tag::Send, line);
    }

    pub fn info(&mut self, msg: &str) {
        info!("[{}] {}", self.id, msg);
        self.append(Tag::Info, msg);
    }

    pub fn warn(&mut self, msg: &str) {
        warn!("[{}] {}", self.id, msg);
        self.append(Tag::Warning, msg);
    }

    pub fn error(&mut self, msg: &str) {
        error!("[{}] {}", self.id, msg);
        self.append(Tag::Error, msg);
    }

    fn append(&mut self, tag: Tag, msg: &str) {
        let Some(path) = &self.file else {
            return;
        };
        let line = format!(
            "{}\t{}\t{}\r\n",
            Local::now().format("%Y-%m-%d %H:%M:%S:%3f"),
            tag.as_str(),
            msg.trim()
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            if !self.write_failed {
                self.write_failed = true;
                warn!("Cannot write session log {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_lines_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new("127.0.0.1", Some(dir.path()));
        log.received("USER alice");
        log.sent("331 Password required for alice");
        log.warn("something odd");

        let path = log.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_127.0.0.1.txt"));

        let text = fs::read_to_string(&path).unwrap();
        let tags: Vec<&str> = text
            .lines()
            .map(|l| l.split('\t').nth(1).unwrap())
            .collect();
        assert_eq!(tags, vec!["RECV", "SEND", "WARNING"]);
        assert!(text.contains("\tUSER alice\r\n"));
    }

    #[test]
    fn login_moves_transcript_into_user_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::new("::1", Some(dir.path()));
        log.info("connected");
        let before = log.path().unwrap().to_path_buf();

        log.set_user("alice");
        log.info("logged in");

        let after = log.path().unwrap().to_path_buf();
        assert!(!before.exists());
        assert_eq!(after.parent().unwrap(), dir.path().join("alice"));
        assert_eq!(fs::read_to_string(&after).unwrap().lines().count(), 2);
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let mut log = SessionLog::disabled("peer");
        log.error("boom");
        assert!(log.path().is_none());
    }
}
