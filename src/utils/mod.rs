//! Utility functions
//!
//! Provides logging setup, session transcripts and network helpers.

pub mod logging;
pub mod network;

pub use logging::{SessionLog, init_logging};
pub use network::{PublicAddressResolver, advertised_address, is_private_peer};
