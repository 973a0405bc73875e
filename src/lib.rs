//! sandbox-ftpd
//!
//! An FTP server that confines every account to its own directory tree,
//! with active and passive data connections, restartable transfers and
//! per-session transcripts.

pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use config::ServerConfig;
pub use server::Server;

/// Version announced in the greeting and in `XINFO`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
