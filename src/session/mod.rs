//! Session management
//!
//! Handles control connections, per-session state and the registry of live
//! sessions.

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::handle_session;
pub use registry::{Registration, SessionInfo, SessionRegistry};
pub use state::{AuthState, RenameSource, Session};
