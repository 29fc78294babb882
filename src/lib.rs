//! `getexeicon` - Primary icon extraction for Windows executables
//!
//! Extracts the icon the shell shows for an executable, a library, or the
//! executable behind a running process, and returns it as a standalone `.ico`
//! container. Modules are parsed directly from their PE resource directory, so
//! extraction never loads or runs the target.
//!
//! ```no_run
//! let ico = getexeicon::get_icon_from_file(r"C:\Windows\notepad.exe", true)?;
//! std::fs::write("notepad.ico", ico)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The pipeline has three stages, each usable on its own:
//!
//! - [`locator`] resolves a path or process id to a module on disk
//! - [`reader`] reads icon groups and their images from the module
//! - [`encoder`] serializes images into an icon container
//!
//! [`IconExtractor`] chains them. [`worker`] runs extractions off the calling thread.

pub mod config;
pub mod container;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod reader;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod test_utils;

pub use error::{ErrorKind, IconError, Result};
pub use extractor::{
    ExtractionRequest, IconExtractor, get_default_exe_icon, get_icon_from_file, get_icon_from_pid,
};
#[cfg(windows)]
pub use extractor::get_icon_from_process_handle;
pub use locator::{ModuleLocator, Selector};
pub use reader::{IconResourceReader, IconVariant};
