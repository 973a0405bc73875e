//! FTP Protocol implementation
//!
//! Handles control line reading, command parsing, dispatch and reply
//! formatting.

pub mod commands;
pub mod encoding;
pub mod handlers;
pub mod reader;
pub mod responses;

pub use commands::{Command, CommandStatus, loggable_line, parse_command};
pub use encoding::TextEncoding;
pub use handlers::handle_command;
pub use reader::{ControlLine, read_control_line};
pub use responses::Reply;
