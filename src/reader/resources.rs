//! Resource directory walk
//!
//! The resource tree has three levels: type, name, language. Leaves are data
//! entries holding an RVA and a size. Icons are stored as one `RT_GROUP_ICON`
//! resource per logical icon, whose body is an icon directory that references
//! `RT_ICON` resources by id instead of by file offset.

use super::pe::PeImage;
use super::variant::{IconGroup, IconVariant, ResourceName};
use crate::error::{IconError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::{debug, warn};

const RT_ICON: u16 = 3;
const RT_GROUP_ICON: u16 = 14;

const DIRECTORY_HEADER_SIZE: usize = 16;
const DIRECTORY_ENTRY_SIZE: usize = 8;
const DATA_ENTRY_SIZE: usize = 16;
/// High bit of an entry's name field (string name) or offset field (subdirectory)
const HIGH_BIT: u32 = 0x8000_0000;

const GROUP_HEADER_SIZE: usize = 6;
const GROUP_ENTRY_SIZE: usize = 14;
const ICON_RESOURCE_TYPE: u16 = 1;

/// One entry of a resource directory
#[derive(Debug)]
struct DirectoryEntry {
    name: ResourceName,
    /// Offset of the subdirectory or data entry, relative to the resource root
    offset: u32,
    is_directory: bool,
}

/// A module's resource tree
pub(crate) struct ResourceTable<'a> {
    image: &'a PeImage<'a>,
    /// Bytes from the resource root to the end of its section
    root: &'a [u8],
}

impl<'a> ResourceTable<'a> {
    /// Open the resource tree of an image, if it has one
    pub(crate) fn open(image: &'a PeImage<'a>) -> Result<Option<Self>> {
        Ok(image
            .resource_section()?
            .map(|root| Self { image, root }))
    }

    /// Read every icon group, in resource-table order
    pub(crate) fn icon_groups(&self) -> Result<Vec<IconGroup>> {
        let Some(groups) = self.type_directory(RT_GROUP_ICON)? else {
            return Ok(Vec::new());
        };

        let icons = self.type_directory(RT_ICON)?;
        let mut result = Vec::new();
        for entry in self.entries(groups)? {
            let data = self.first_language_data(&entry)?;
            result.push(self.build_group(entry.name, data, icons)?);
        }

        debug!("Read {} icon groups", result.len());
        Ok(result)
    }

    /// Read the first icon group in table order
    pub(crate) fn primary_icon_group(&self) -> Result<Option<IconGroup>> {
        let Some(groups) = self.type_directory(RT_GROUP_ICON)? else {
            return Ok(None);
        };

        let Some(entry) = self.entries(groups)?.into_iter().next() else {
            return Ok(None);
        };

        let icons = self.type_directory(RT_ICON)?;
        let data = self.first_language_data(&entry)?;
        self.build_group(entry.name, data, icons).map(Some)
    }

    /// Read a single icon group by name
    pub(crate) fn icon_group(&self, name: &ResourceName) -> Result<Option<IconGroup>> {
        let Some(groups) = self.type_directory(RT_GROUP_ICON)? else {
            return Ok(None);
        };

        let Some(entry) = self.entries(groups)?.into_iter().find(|e| &e.name == name) else {
            return Ok(None);
        };

        let icons = self.type_directory(RT_ICON)?;
        let data = self.first_language_data(&entry)?;
        self.build_group(entry.name, data, icons).map(Some)
    }

    /// Turn a `RT_GROUP_ICON` body into a group of variants
    ///
    /// Records whose `RT_ICON` is missing or empty are skipped.
    fn build_group(&self, name: ResourceName, data: &[u8], icons: Option<u32>) -> Result<IconGroup> {
        let mut cursor = Cursor::new(data);
        let (_reserved, resource_type, count) = read_group_header(&mut cursor)
            .map_err(|_| corrupt(&format!("icon group {name} header is truncated")))?;

        if resource_type != ICON_RESOURCE_TYPE {
            return Err(corrupt(&format!(
                "icon group {name} has resource type {resource_type}"
            )));
        }

        if data.len() < GROUP_HEADER_SIZE + usize::from(count) * GROUP_ENTRY_SIZE {
            return Err(corrupt(&format!(
                "icon group {name} declares {count} images but holds {} bytes",
                data.len()
            )));
        }

        let icon_entries = match icons {
            Some(offset) => self.entries(offset)?,
            None => Vec::new(),
        };

        let mut variants = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let record = read_group_record(&mut cursor)
                .map_err(|_| corrupt(&format!("icon group {name} is truncated")))?;

            let Some(icon) = icon_entries
                .iter()
                .find(|e| e.name == ResourceName::Id(record.id))
            else {
                warn!("Icon group {} references missing RT_ICON #{}", name, record.id);
                continue;
            };

            let image = self.first_language_data(icon)?;
            if image.is_empty() {
                warn!("Icon group {} references empty RT_ICON #{}", name, record.id);
                continue;
            }

            variants.push(IconVariant::from_resource(
                record.width,
                record.height,
                record.color_count,
                record.planes,
                record.bit_count,
                record.id,
                image.to_vec(),
            ));
        }

        Ok(IconGroup::new(name, variants))
    }

    /// Offset of the name-level directory for a resource type
    fn type_directory(&self, resource_type: u16) -> Result<Option<u32>> {
        let wanted = ResourceName::Id(resource_type);
        Ok(self
            .entries(0)?
            .into_iter()
            .find(|e| e.name == wanted && e.is_directory)
            .map(|e| e.offset))
    }

    /// Entries of the directory at `offset`: named entries first, then ids, as stored
    fn entries(&self, offset: u32) -> Result<Vec<DirectoryEntry>> {
        let start = offset as usize;
        let header = self
            .root
            .get(start..start + DIRECTORY_HEADER_SIZE)
            .ok_or_else(|| corrupt(&format!("directory at {offset:#x} is out of bounds")))?;

        let named = u16::from_le_bytes([header[12], header[13]]);
        let ids = u16::from_le_bytes([header[14], header[15]]);
        let count = usize::from(named) + usize::from(ids);

        let table_start = start + DIRECTORY_HEADER_SIZE;
        let table = self
            .root
            .get(table_start..table_start + count * DIRECTORY_ENTRY_SIZE)
            .ok_or_else(|| corrupt(&format!("directory at {offset:#x} overruns the section")))?;

        table
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(|raw| {
                let name_field = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let offset_field = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
                Ok(DirectoryEntry {
                    name: self.entry_name(name_field)?,
                    offset: offset_field & !HIGH_BIT,
                    is_directory: offset_field & HIGH_BIT != 0,
                })
            })
            .collect()
    }

    fn entry_name(&self, field: u32) -> Result<ResourceName> {
        if field & HIGH_BIT == 0 {
            return u16::try_from(field)
                .map(ResourceName::Id)
                .map_err(|_| corrupt(&format!("resource id {field} exceeds 16 bits")));
        }

        let start = (field & !HIGH_BIT) as usize;
        let length = self
            .root
            .get(start..start + 2)
            .map(|b| usize::from(u16::from_le_bytes([b[0], b[1]])))
            .ok_or_else(|| corrupt("resource name is out of bounds"))?;

        let units: Vec<u16> = self
            .root
            .get(start + 2..start + 2 + length * 2)
            .ok_or_else(|| corrupt("resource name overruns the section"))?
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        Ok(ResourceName::Name(String::from_utf16_lossy(&units)))
    }

    /// Data of the first language of a name-level entry
    fn first_language_data(&self, entry: &DirectoryEntry) -> Result<&'a [u8]> {
        let leaf = if entry.is_directory {
            let language = self
                .entries(entry.offset)?
                .into_iter()
                .next()
                .ok_or_else(|| corrupt(&format!("resource {} has no languages", entry.name)))?;
            if language.is_directory {
                return Err(corrupt(&format!(
                    "resource {} nests deeper than three levels",
                    entry.name
                )));
            }
            language.offset
        } else {
            entry.offset
        };

        let start = leaf as usize;
        let raw = self
            .root
            .get(start..start + DATA_ENTRY_SIZE)
            .ok_or_else(|| corrupt(&format!("data entry of {} is out of bounds", entry.name)))?;
        let rva = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let size = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);

        self.image.slice_at_rva(rva, size)
    }
}

/// Reserved, type and count fields of a `RT_GROUP_ICON` body
fn read_group_header(cursor: &mut Cursor<&[u8]>) -> std::io::Result<(u16, u16, u16)> {
    Ok((
        cursor.read_u16::<LittleEndian>()?,
        cursor.read_u16::<LittleEndian>()?,
        cursor.read_u16::<LittleEndian>()?,
    ))
}

/// A record of a `RT_GROUP_ICON` directory
struct GroupRecord {
    width: u8,
    height: u8,
    color_count: u8,
    planes: u16,
    bit_count: u16,
    id: u16,
}

fn read_group_record(cursor: &mut Cursor<&[u8]>) -> std::io::Result<GroupRecord> {
    let width = cursor.read_u8()?;
    let height = cursor.read_u8()?;
    let color_count = cursor.read_u8()?;
    let _reserved = cursor.read_u8()?;
    let planes = cursor.read_u16::<LittleEndian>()?;
    let bit_count = cursor.read_u16::<LittleEndian>()?;
    // Declared size is unreliable for images over 64 KiB; the RT_ICON size is used instead
    let _bytes_in_res = cursor.read_u32::<LittleEndian>()?;
    let id = cursor.read_u16::<LittleEndian>()?;
    Ok(GroupRecord {
        width,
        height,
        color_count,
        planes,
        bit_count,
        id,
    })
}

fn corrupt(detail: &str) -> IconError {
    IconError::CorruptResourceTable(detail.to_string())
}
