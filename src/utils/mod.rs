//! Utility modules
//!
//! Logging setup for the command-line tool.

pub mod logging;

pub use logging::init_logging;
