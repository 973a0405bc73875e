//! File system storage management
//!
//! Handles the sandboxed virtual filesystem, directory listings and file
//! mutations.

pub mod listing;
pub mod operations;
pub mod sandbox;

pub use listing::list_current;
pub use sandbox::VirtualFs;
