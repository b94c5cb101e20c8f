//! Logging utilities.
//!
//! Centralizes logger initialization for hosts. Library code only depends on
//! the `log` facade.

mod init;

pub use init::{init_logging, LoggingConfig};
