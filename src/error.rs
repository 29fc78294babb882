//! Error types for icon extraction
//!
//! Every failure of the extraction pipeline is surfaced as an [`IconError`]
//! carrying its kind. Callers that only need to branch on the kind can use
//! [`IconError::kind`], which returns a plain `Copy` value.
//!
//! Error variants use `#[source]` to preserve error chains for better
//! observability and debugging.

use std::path::PathBuf;
use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// Main error type for icon extraction
#[derive(Debug, Error)]
pub enum IconError {
    /// The requested file does not exist
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The caller lacks permission to read the file or query the process
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No process with the given identifier exists
    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    /// The target has no resolvable backing module image
    #[error("Module unavailable: {0}")]
    ModuleUnavailable(String),

    /// The file does not carry a valid executable module header
    #[error("Not an executable module: {0}")]
    NotAnExecutable(String),

    /// The module's resource directory is malformed
    #[error("Corrupt resource table: {0}")]
    CorruptResourceTable(String),

    /// There were no icon variants to encode
    #[error("No icon images to encode")]
    EmptyInput,

    /// The container assembly produced inconsistent offsets or sizes
    ///
    /// This indicates a defect in the encoder, not a caller mistake.
    #[error("Icon container assembly failed: {0}")]
    EncodeError(String),

    /// An embedded PNG image could not be decoded
    /// Preserves the underlying error source for full error chain transparency
    #[error("Icon image {resource_id} could not be decoded: {source}")]
    CorruptImage {
        /// RT_ICON resource id of the offending image
        resource_id: u16,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// A byte buffer is not a well-formed icon container
    #[error("Invalid icon container: {0}")]
    InvalidContainer(String),

    /// Configuration error
    /// Preserves the underlying error source for full error chain transparency
    #[error("Configuration error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Windows API error
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApi(#[from] windows::core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Discriminant of an [`IconError`], for matching without borrowing payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`IconError::PathNotFound`]
    PathNotFound,
    /// See [`IconError::AccessDenied`]
    AccessDenied,
    /// See [`IconError::ProcessNotFound`]
    ProcessNotFound,
    /// See [`IconError::ModuleUnavailable`]
    ModuleUnavailable,
    /// See [`IconError::NotAnExecutable`]
    NotAnExecutable,
    /// See [`IconError::CorruptResourceTable`]
    CorruptResourceTable,
    /// See [`IconError::EmptyInput`]
    EmptyInput,
    /// See [`IconError::EncodeError`]
    EncodeError,
    /// See [`IconError::CorruptImage`]
    CorruptImage,
    /// See [`IconError::InvalidContainer`]
    InvalidContainer,
    /// Configuration, IO, JSON or OS API failures outside the extraction taxonomy
    Other,
}

impl IconError {
    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathNotFound(_) => ErrorKind::PathNotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::ProcessNotFound(_) => ErrorKind::ProcessNotFound,
            Self::ModuleUnavailable(_) => ErrorKind::ModuleUnavailable,
            Self::NotAnExecutable(_) => ErrorKind::NotAnExecutable,
            Self::CorruptResourceTable(_) => ErrorKind::CorruptResourceTable,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::EncodeError(_) => ErrorKind::EncodeError,
            Self::CorruptImage { .. } => ErrorKind::CorruptImage,
            Self::InvalidContainer(_) => ErrorKind::InvalidContainer,
            #[cfg(windows)]
            Self::WindowsApi(_) => ErrorKind::Other,
            Self::Config(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Other,
        }
    }

    /// Map an IO error raised while touching `path` onto the extraction taxonomy
    ///
    /// `NotFound` and `PermissionDenied` get their own kinds; anything else stays an IO error.
    pub(crate) fn from_io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => {
                Self::AccessDenied(format!("{}: {err}", path.display()))
            }
            _ => Self::Io(err),
        }
    }
}

/// Result type alias for icon extraction operations
pub type Result<T> = std::result::Result<T, IconError>;

/// Convert an error to a user-friendly message
///
/// This function takes an `IconError` and returns a message suitable
/// for printing from the command-line tool, including a hint on how to
/// resolve common issues.
pub fn user_friendly_message(error: &IconError) -> String {
    match error {
        IconError::PathNotFound(path) => {
            format!(
                "The file {} does not exist.\n\n\
                 Check the path and try again.",
                path.display()
            )
        }
        IconError::AccessDenied(detail) => {
            format!(
                "Access was denied: {detail}\n\n\
                 Protected and system processes can only be queried\n\
                 from an elevated prompt."
            )
        }
        IconError::ProcessNotFound(pid) => {
            format!(
                "No process with id {pid} is running.\n\n\
                 The process may have exited before its icon was read."
            )
        }
        IconError::ModuleUnavailable(detail) => {
            format!(
                "The target has no executable image to read icons from:\n\n{detail}\n\n\
                 System pseudo-processes cannot be inspected."
            )
        }
        IconError::NotAnExecutable(detail) => {
            format!(
                "The file is not an executable or DLL:\n\n{detail}\n\n\
                 Only PE modules (.exe, .dll, .ocx, ...) carry icon resources."
            )
        }
        IconError::CorruptResourceTable(detail) | IconError::InvalidContainer(detail) => {
            format!(
                "The file is damaged:\n\n{detail}\n\n\
                 Try again with an intact copy of the file."
            )
        }
        IconError::CorruptImage { resource_id, .. } => {
            format!(
                "Icon image #{resource_id} in the module is damaged.\n\n\
                 Retry without --no-png to copy the image without decoding it."
            )
        }
        IconError::EmptyInput => "The module does not contain an icon.\n\n\
             Use the 'default' command to get the generic executable icon instead."
            .to_string(),
        IconError::EncodeError(detail) => {
            format!("Internal error while building the icon file:\n\n{detail}")
        }
        IconError::Config(e) => {
            format!(
                "Failed to load or save configuration:\n\n{e}\n\n\
                 Default settings will be used."
            )
        }
        #[cfg(windows)]
        IconError::WindowsApi(e) => {
            format!(
                "A Windows API error occurred:\n\n{e}\n\n\
                 Please ensure your Windows installation is up to date."
            )
        }
        IconError::Io(e) => {
            format!(
                "A file system error occurred:\n\n{e}\n\n\
                 Please check file permissions and disk space."
            )
        }
        IconError::Json(e) => {
            format!(
                "Configuration file is corrupted:\n\n{e}\n\n\
                 Default settings will be used."
            )
        }
    }
}
