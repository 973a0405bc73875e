//! Session registry
//!
//! Tracks live sessions for the `XINFO` census and for diagnostics when
//! passive ports run out. Sessions register on connect and are removed
//! when their `Registration` guard drops.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local};

/// What the census knows about one live session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: u64,
    pub started: DateTime<Local>,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub passive_port: Option<u16>,
    pub login: Option<String>,
    pub root: Option<PathBuf>,
}

impl SessionInfo {
    /// Tab-separated summary: start time, peer, server address, passive
    /// port and `login @ root` when known.
    pub fn one_line(&self) -> String {
        let mut line = format!(
            "{}\t{}\t{}\t",
            self.started.format("%Y-%m-%d %H:%M:%S"),
            self.peer_addr.ip(),
            self.local_addr.ip()
        );
        if let Some(port) = self.passive_port {
            line.push_str(&format!("ssport:{port}\t"));
        }
        if let (Some(login), Some(root)) = (&self.login, &self.root) {
            line.push_str(&format!("{} @ {}", login, root.display()));
        }
        line
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, SessionInfo>>,
    next_id: AtomicU64,
    total: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The entry lives as long as the returned guard.
    pub fn register(
        self: &Arc<Self>,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.total.fetch_add(1, Ordering::Relaxed);

        let info = SessionInfo {
            id,
            started: Local::now(),
            peer_addr,
            local_addr,
            passive_port: None,
            login: None,
            root: None,
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, info);

        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Live sessions ordered by id.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<SessionInfo> = sessions.values().cloned().collect();
        list.sort_by_key(|info| info.id);
        list
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Connections accepted since start, including closed ones.
    pub fn total_connections(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Multi-line census used by XINFO and by port exhaustion logs.
    pub fn census(&self, version: &str) -> Vec<String> {
        let sessions = self.snapshot();
        let mut lines = vec![
            "SysInfo:".to_string(),
            format!(" --- sandbox-ftpd {version} ---"),
            format!("  Total connections: {}", self.total_connections()),
            format!("  Active sessions: {}", sessions.len()),
        ];
        lines.extend(sessions.iter().map(|info| format!("    {}", info.one_line())));
        lines.push("End".to_string());
        lines
    }

    fn remove(&self, id: u64) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Keeps a session listed in the registry until dropped.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<SessionRegistry>,
    id: u64,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut SessionInfo),
    {
        let mut sessions = self
            .registry
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = sessions.get_mut(&self.id) {
            f(info);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
