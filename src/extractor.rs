//! Extraction facade
//!
//! Ties resolution, resource reading and encoding together. Every call is
//! synchronous and self-contained: nothing is cached between calls and no OS
//! handle outlives the call that opened it.

use crate::config::{DefaultIconSource, ExtractorConfig};
use crate::encoder::encode;
use crate::error::Result;
use crate::locator::{ModuleLocator, ModuleReference, NativeLocator, Selector};
use crate::reader::{IconGroup, IconResourceReader, PeResourceReader};
#[cfg(windows)]
use std::os::windows::io::BorrowedHandle;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A single extraction to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// What to extract from
    pub selector: Selector,
    /// Keep embedded PNG images as they are
    pub prefer_png: bool,
}

impl ExtractionRequest {
    /// Extract from a module on disk
    pub fn file(path: impl Into<PathBuf>, prefer_png: bool) -> Self {
        Self {
            selector: Selector::Path(path.into()),
            prefer_png,
        }
    }

    /// Extract from the executable of a running process
    pub fn pid(pid: u32, prefer_png: bool) -> Self {
        Self {
            selector: Selector::Pid(pid),
            prefer_png,
        }
    }
}

/// Extracts primary icons into icon containers
#[derive(Debug, Clone)]
pub struct IconExtractor<L = NativeLocator, R = PeResourceReader> {
    locator: L,
    reader: R,
    config: ExtractorConfig,
}

impl IconExtractor {
    /// Extractor for the current platform with the default configuration
    pub fn new() -> Self {
        Self::from_config(ExtractorConfig::default())
    }

    /// Extractor for the current platform with the given configuration
    pub fn from_config(config: ExtractorConfig) -> Self {
        Self {
            locator: NativeLocator,
            reader: PeResourceReader,
            config,
        }
    }
}

impl Default for IconExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ModuleLocator, R: IconResourceReader> IconExtractor<L, R> {
    /// Extractor built from explicit capabilities
    pub fn with_parts(locator: L, reader: R) -> Self {
        Self {
            locator,
            reader,
            config: ExtractorConfig::default(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Primary icon of the module at `path`
    ///
    /// # Errors
    ///
    /// Any resolution, reading or encoding failure. A module without icon
    /// resources yields [`IconError::EmptyInput`](crate::IconError::EmptyInput).
    pub fn icon_from_file(&self, path: &Path, prefer_png: bool) -> Result<Vec<u8>> {
        self.extract(&ExtractionRequest::file(path, prefer_png))
    }

    /// Primary icon of the executable backing process `pid`
    pub fn icon_from_pid(&self, pid: u32, prefer_png: bool) -> Result<Vec<u8>> {
        self.extract(&ExtractionRequest::pid(pid, prefer_png))
    }

    /// Run a single extraction
    pub fn extract(&self, request: &ExtractionRequest) -> Result<Vec<u8>> {
        let module = self.locator.resolve(&request.selector)?;
        self.primary_icon(&module, request.prefer_png)
    }

    fn primary_icon(&self, module: &ModuleReference, prefer_png: bool) -> Result<Vec<u8>> {
        let group = self.reader.read_primary_group(&module)?;
        let variants = group.map(|g| g.variants).unwrap_or_default();

        debug!(
            "Encoding {} icon images from {}",
            variants.len(),
            module.path().display()
        );
        encode(&variants, prefer_png)
    }

    /// The shell's generic executable icon
    ///
    /// Tries each configured source in order.
    ///
    /// # Panics
    ///
    /// Panics if no source yields an icon. These resources ship with every
    /// supported OS install, so their absence means the environment is broken.
    pub fn default_exe_icon(&self, prefer_png: bool) -> Vec<u8> {
        if let Some(icon) = self.try_default_exe_icon(prefer_png) {
            return icon;
        }

        error!(
            "No default executable icon in any of {} sources",
            self.config.default_icon_sources.len()
        );
        panic!("default executable icon is unavailable on this system");
    }

    fn try_default_exe_icon(&self, prefer_png: bool) -> Option<Vec<u8>> {
        self.config
            .default_icon_sources
            .iter()
            .find_map(|source| match self.default_icon_from(source, prefer_png) {
                Ok(Some(icon)) => {
                    info!("Default icon taken from {}#{}", source.module, source.group);
                    Some(icon)
                }
                Ok(None) => {
                    debug!("{} has no icon group #{}", source.module, source.group);
                    None
                }
                Err(e) => {
                    warn!("Default icon source {} failed: {}", source.module, e);
                    None
                }
            })
    }

    fn default_icon_from(
        &self,
        source: &DefaultIconSource,
        prefer_png: bool,
    ) -> Result<Option<Vec<u8>>> {
        let module: ModuleReference = self.locator.system_module(&source.module)?;
        let Some(IconGroup { variants, .. }) =
            self.reader.read_group(&module, &source.group_name())?
        else {
            return Ok(None);
        };
        encode(&variants, prefer_png).map(Some)
    }
}

#[cfg(windows)]
impl<R: IconResourceReader> IconExtractor<NativeLocator, R> {
    /// Primary icon of the executable behind an open process handle
    ///
    /// The handle needs `PROCESS_QUERY_LIMITED_INFORMATION` access and is not closed.
    pub fn icon_from_process_handle(
        &self,
        process: BorrowedHandle<'_>,
        prefer_png: bool,
    ) -> Result<Vec<u8>> {
        let module = self.locator.resolve_process_handle(process)?;
        self.primary_icon(&module, prefer_png)
    }
}

/// Primary icon of the module at `path`, as an icon container
pub fn get_icon_from_file(path: impl AsRef<Path>, prefer_png: bool) -> Result<Vec<u8>> {
    IconExtractor::new().icon_from_file(path.as_ref(), prefer_png)
}

/// Primary icon of the executable backing process `pid`, as an icon container
pub fn get_icon_from_pid(pid: u32, prefer_png: bool) -> Result<Vec<u8>> {
    IconExtractor::new().icon_from_pid(pid, prefer_png)
}

/// Primary icon of the executable behind an open process handle, as an icon container
#[cfg(windows)]
pub fn get_icon_from_process_handle(
    process: BorrowedHandle<'_>,
    prefer_png: bool,
) -> Result<Vec<u8>> {
    IconExtractor::new().icon_from_process_handle(process, prefer_png)
}

/// The shell's generic executable icon, as an icon container
///
/// # Panics
///
/// Panics if the system icon libraries are missing or carry no such icon.
pub fn get_default_exe_icon(prefer_png: bool) -> Vec<u8> {
    IconExtractor::new().default_exe_icon(prefer_png)
}
