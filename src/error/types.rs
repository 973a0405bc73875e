//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.
//! Every error knows the reply code it maps to, so handlers never have to
//! guess the reply class of a failure.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Authentication module errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential file missing: {0}")]
    CredentialFileMissing(PathBuf),

    #[error("failed to read credential file {path}: {source}")]
    CredentialFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("home directory unavailable for {login}: {path}")]
    HomeUnavailable { login: String, path: PathBuf },
}

impl AuthError {
    pub fn reply_code(&self) -> u16 {
        530
    }
}

/// Virtual filesystem errors
///
/// `NotFound` deliberately covers both missing paths and sandbox escapes so
/// that replies never reveal where the sandbox boundary lies.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Not a file")]
    NotAFile(String),

    #[error("{0}: Not a directory")]
    NotADirectory(String),

    #[error("{path}: Directory not empty ({entries} files/dirs in there)")]
    DirectoryNotEmpty { path: String, entries: usize },

    #[error("invalid sandbox root {path}: {source}")]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn reply_code(&self) -> u16 {
        550
    }
}

/// Data channel and transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("no data connection armed, send PORT or PASV first")]
    NotArmed,

    #[error("illegal PORT argument: {0}")]
    InvalidPortArgument(String),

    #[error("no free passive port in range {min}-{max}")]
    NoAvailablePort { min: u16, max: u16 },

    #[error("failed to bind passive listener on {addr}: {source}")]
    PortBindingFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("no data connection within {0:?}")]
    AcceptTimeout(Duration),

    #[error("could not reach {addr} within {wait:?}")]
    ConnectTimeout { addr: SocketAddr, wait: Duration },

    #[error("data connection from {actual} rejected, control peer is {expected}")]
    PeerMismatch { expected: IpAddr, actual: IpAddr },

    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("passive address unavailable: {0}")]
    AddressUnavailable(String),

    #[error("restart offset {offset} does not match file length {length}")]
    RestartMismatch { offset: u64, length: u64 },

    #[error("transfer failed: {0}")]
    TransferFailed(#[from] io::Error),
}

impl TransferError {
    /// Convert to the FTP reply code used when this error ends a command.
    pub fn reply_code(&self) -> u16 {
        match self {
            TransferError::InvalidPortArgument(_) => 501,
            TransferError::NoAvailablePort { .. }
            | TransferError::PortBindingFailed { .. }
            | TransferError::AddressUnavailable(_) => 550,
            TransferError::RestartMismatch { .. } => 554,
            TransferError::TransferFailed(_) => 426,
            TransferError::NotArmed
            | TransferError::AcceptTimeout(_)
            | TransferError::ConnectTimeout { .. }
            | TransferError::PeerMismatch { .. }
            | TransferError::ConnectFailed { .. } => 425,
        }
    }
}

/// Listener-level errors; these are the only errors that stop the process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind control socket {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
