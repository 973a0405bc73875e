//! Error handling
//!
//! Defines error types for the FTP server.

pub mod types;

pub use types::*;
