//! Configuration management module
//!
//! Extraction settings live in `<data dir>/getexeicon/config.json`, where the
//! data directory is `%APPDATA%` (or the working directory when it is unset).
//! Saves go through a temporary file in the same directory so a crash never
//! leaves a half-written configuration behind.

pub mod manager;
pub mod models;

pub use manager::ConfigManager;
pub use models::{DefaultIconSource, ExtractorConfig};
