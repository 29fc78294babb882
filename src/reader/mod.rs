//! Icon resource reading
//!
//! Reads the icon groups embedded in a module. [`PeResourceReader`] parses the
//! PE resource directory directly from the file bytes, which gives the same
//! view as loading the module as a data file and enumerating its resources,
//! without executing anything and on any host.

mod pe;
mod resources;
mod variant;

pub use variant::{IconGroup, IconPayload, IconVariant, ResourceName, sort_variants};

use crate::error::{IconError, Result};
use crate::locator::ModuleReference;
use pe::PeImage;
use resources::ResourceTable;
use tracing::debug;

/// Reads icon resources from a resolved module
pub trait IconResourceReader {
    /// Every icon group, in resource-table order
    ///
    /// A module without icon resources yields an empty vector.
    fn read_groups(&self, module: &ModuleReference) -> Result<Vec<IconGroup>>;

    /// A single icon group by resource name, or `None` if the module lacks it
    fn read_group(&self, module: &ModuleReference, name: &ResourceName)
    -> Result<Option<IconGroup>>;

    /// The primary icon group: the first `RT_GROUP_ICON` in resource-table order
    ///
    /// This is the group the shell shows for an executable.
    fn read_primary_group(&self, module: &ModuleReference) -> Result<Option<IconGroup>> {
        Ok(self.read_groups(module)?.into_iter().next())
    }

    /// Every variant of every group, groups in table order, each group largest first
    fn read_variants(&self, module: &ModuleReference) -> Result<Vec<IconVariant>> {
        Ok(self
            .read_groups(module)?
            .into_iter()
            .flat_map(|group| group.variants)
            .collect())
    }
}

/// Reader for PE modules (`.exe`, `.dll`, `.ocx`, ...)
///
/// The file is read in a single call, so no handle outlives the read.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeResourceReader;

impl PeResourceReader {
    fn load(module: &ModuleReference) -> Result<Vec<u8>> {
        let path = module.path();
        let data = std::fs::read(path).map_err(|e| IconError::from_io_at(path, e))?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }
}

impl IconResourceReader for PeResourceReader {
    fn read_groups(&self, module: &ModuleReference) -> Result<Vec<IconGroup>> {
        let data = Self::load(module)?;
        parse_icon_groups(&data)
    }

    fn read_group(
        &self,
        module: &ModuleReference,
        name: &ResourceName,
    ) -> Result<Option<IconGroup>> {
        let data = Self::load(module)?;
        let image = PeImage::parse(&data)?;
        match ResourceTable::open(&image)? {
            Some(table) => table.icon_group(name),
            None => Ok(None),
        }
    }

    fn read_primary_group(&self, module: &ModuleReference) -> Result<Option<IconGroup>> {
        let data = Self::load(module)?;
        let image = PeImage::parse(&data)?;
        match ResourceTable::open(&image)? {
            Some(table) => table.primary_icon_group(),
            None => Ok(None),
        }
    }
}

/// Parse every icon group out of in-memory module bytes
pub fn parse_icon_groups(data: &[u8]) -> Result<Vec<IconGroup>> {
    let image = PeImage::parse(data)?;
    match ResourceTable::open(&image)? {
        Some(table) => table.icon_groups(),
        None => Ok(Vec::new()),
    }
}
