//! Server core functionality
//!
//! This module contains the control listener, the shared server context
//! and the session spawning seam.

pub mod core;
pub mod spawner;

pub use self::core::{Server, ServerContext};
pub use spawner::{SessionFuture, SessionSpawner, TokioSpawner};
