//! Module resolution
//!
//! Turns a caller-supplied [`Selector`] (a file path or a process id) into a
//! [`ModuleReference`] naming the on-disk module whose icon resources will be
//! read. Resolution only queries the OS; the target file is never opened here.
//!
//! Platform variation lives behind the [`ModuleLocator`] trait. [`NativeLocator`]
//! is the implementation for the compilation target.

mod native;

pub use native::NativeLocator;

use crate::error::{IconError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identifies what to extract an icon from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// An executable or library on disk
    Path(PathBuf),
    /// A running process, resolved to its main executable image
    Pid(u32),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "file {}", path.display()),
            Self::Pid(pid) => write!(f, "process {pid}"),
        }
    }
}

/// How a [`ModuleReference`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Given directly by the caller
    File,
    /// Backing image of the process with this id
    Process(u32),
    /// Module from the OS system directory
    System,
}

/// A resolved module whose resources can be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    path: PathBuf,
    origin: ModuleOrigin,
}

impl ModuleReference {
    /// Create a reference without touching the filesystem
    pub fn new(path: impl Into<PathBuf>, origin: ModuleOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }

    /// Path of the module on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How the module was resolved
    pub fn origin(&self) -> ModuleOrigin {
        self.origin
    }
}

/// Resolves selectors to modules
///
/// Implementations must be free of side effects beyond the OS queries they perform.
pub trait ModuleLocator {
    /// Resolve a selector to the module backing it
    fn resolve(&self, selector: &Selector) -> Result<ModuleReference> {
        match selector {
            Selector::Path(path) => resolve_file(path),
            Selector::Pid(pid) => self.resolve_pid(*pid),
        }
    }

    /// Resolve a process id to its main executable image
    fn resolve_pid(&self, pid: u32) -> Result<ModuleReference>;

    /// Resolve a module by file name inside the OS system directory
    fn system_module(&self, name: &str) -> Result<ModuleReference>;
}

/// Validate a caller-supplied path
///
/// Only file metadata is queried. Missing files map to `PathNotFound`,
/// unreadable ones to `AccessDenied`, directories to `NotAnExecutable`.
pub fn resolve_file(path: &Path) -> Result<ModuleReference> {
    let metadata = std::fs::metadata(path).map_err(|e| IconError::from_io_at(path, e))?;

    if metadata.is_dir() {
        return Err(IconError::NotAnExecutable(format!(
            "{} is a directory",
            path.display()
        )));
    }

    debug!("Resolved module path: {}", path.display());
    Ok(ModuleReference::new(path, ModuleOrigin::File))
}
