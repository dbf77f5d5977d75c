//! CLI command implementations.

pub mod ensure_group;
pub mod history;
pub mod init;
pub mod members;
pub mod watch;
