//! Authentication system
//!
//! Handles credential lookup against the accounts file and input checks.

pub mod credentials;
pub mod validator;

pub use credentials::{Account, CredentialStore, FileCredentialStore};
