//! Transfer module for FTP server
//!
//! Handles data channel arming and opening, passive port allocation, and
//! streaming of files and listings over data connections.

pub mod data_channel;
pub mod file_ops;
pub mod modes;
pub mod operations;

pub use data_channel::{DataChannelConfig, open_data_channel};
pub use file_ops::{TransferStats, WriteMode};
pub use modes::TransferMode;
pub use operations::{bind_passive_listener, format_pasv_address, parse_port_argument};
