//! PE image headers
//!
//! Just enough of the Portable Executable layout to find the resource directory
//! and map relative virtual addresses back to file offsets. The image is never
//! loaded or relocated; it is read as plain bytes.

use crate::error::{IconError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

const DOS_SIGNATURE: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
/// Offset of `e_lfanew` in the DOS header
const PE_POINTER_OFFSET: u64 = 0x3C;
const DOS_HEADER_SIZE: usize = 64;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;

const PE32_MAGIC: u16 = 0x10B;
const PE32_PLUS_MAGIC: u16 = 0x20B;

/// Index of the resource table in the optional header's data directories
const RESOURCE_DIRECTORY_INDEX: u32 = 2;

/// A section's placement in memory and in the file
#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_offset: u32,
}

impl Section {
    /// Offset of `rva` inside this section's raw data, if the section maps it
    fn offset_of(&self, rva: u32) -> Option<u32> {
        let span = self.virtual_size.max(self.raw_size);
        let delta = rva.checked_sub(self.virtual_address)?;
        (delta < span && delta < self.raw_size).then_some(delta)
    }
}

/// Parsed headers of a PE module
#[derive(Debug)]
pub(crate) struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<Section>,
    /// RVA and size of the resource directory, if the module has one
    resource_directory: Option<(u32, u32)>,
}

impl<'a> PeImage<'a> {
    /// Parse DOS, COFF, optional and section headers
    ///
    /// Any signature mismatch or truncation here means the file is not a module at all.
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < DOS_HEADER_SIZE || !data.starts_with(DOS_SIGNATURE) {
            return Err(not_executable("missing MZ signature"));
        }

        let mut cursor = Cursor::new(data);
        cursor.set_position(PE_POINTER_OFFSET);
        let pe_offset = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;

        let coff_offset = pe_offset
            .checked_add(PE_SIGNATURE.len())
            .ok_or_else(|| not_executable("PE header offset out of range"))?;
        if data.get(pe_offset..coff_offset) != Some(PE_SIGNATURE.as_slice()) {
            return Err(not_executable("missing PE signature"));
        }

        cursor.set_position((coff_offset + 2) as u64);
        let section_count = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        cursor.set_position((coff_offset + 16) as u64);
        let optional_header_size = usize::from(cursor.read_u16::<LittleEndian>().map_err(truncated)?);

        let optional_offset = coff_offset + COFF_HEADER_SIZE;
        cursor.set_position(optional_offset as u64);
        let magic = cursor.read_u16::<LittleEndian>().map_err(truncated)?;

        // Offsets of NumberOfRvaAndSizes and of the data directory array
        let (count_offset, directories_offset) = match magic {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            other => {
                return Err(not_executable(&format!(
                    "unknown optional header magic {other:#06x}"
                )));
            }
        };

        let resource_directory = if optional_header_size >= directories_offset {
            cursor.set_position((optional_offset + count_offset) as u64);
            let directory_count = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
            let entry_end = directories_offset + (RESOURCE_DIRECTORY_INDEX as usize + 1) * 8;

            if directory_count > RESOURCE_DIRECTORY_INDEX && optional_header_size >= entry_end {
                cursor.set_position(
                    (optional_offset + directories_offset + RESOURCE_DIRECTORY_INDEX as usize * 8)
                        as u64,
                );
                let rva = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
                let size = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
                (rva != 0 && size != 0).then_some((rva, size))
            } else {
                None
            }
        } else {
            None
        };

        let sections_offset = optional_offset + optional_header_size;
        let mut sections = Vec::with_capacity(usize::from(section_count));
        for index in 0..usize::from(section_count) {
            cursor.set_position((sections_offset + index * SECTION_HEADER_SIZE + 8) as u64);
            let virtual_size = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
            let virtual_address = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
            let raw_size = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
            let raw_offset = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
            sections.push(Section {
                virtual_address,
                virtual_size,
                raw_size,
                raw_offset,
            });
        }

        Ok(Self {
            data,
            sections,
            resource_directory,
        })
    }

    /// Bytes of the resource directory, from its root to the end of its section
    ///
    /// Offsets inside the resource tree are relative to the returned slice.
    pub(crate) fn resource_section(&self) -> Result<Option<&'a [u8]>> {
        let Some((rva, _size)) = self.resource_directory else {
            return Ok(None);
        };

        let (section, delta) = self
            .section_for(rva)
            .ok_or_else(|| corrupt(&format!("resource directory RVA {rva:#x} is not mapped")))?;

        let start = file_offset(section.raw_offset, delta)
            .ok_or_else(|| corrupt("resource section lies outside the file"))?;
        let end = file_offset(section.raw_offset, section.raw_size).unwrap_or(usize::MAX);
        self.data
            .get(start..end.min(self.data.len()))
            .filter(|bytes| !bytes.is_empty())
            .map(Some)
            .ok_or_else(|| corrupt("resource section lies outside the file"))
    }

    /// File bytes backing `len` bytes at `rva`
    pub(crate) fn slice_at_rva(&self, rva: u32, len: u32) -> Result<&'a [u8]> {
        let (section, delta) = self
            .section_for(rva)
            .ok_or_else(|| corrupt(&format!("resource data RVA {rva:#x} is not mapped")))?;

        if u64::from(delta) + u64::from(len) > u64::from(section.raw_size) {
            return Err(corrupt(&format!(
                "resource data at RVA {rva:#x} overruns its section"
            )));
        }

        file_offset(section.raw_offset, delta)
            .and_then(|start| Some(start..start.checked_add(usize::try_from(len).ok()?)?))
            .and_then(|range| self.data.get(range))
            .ok_or_else(|| corrupt(&format!("resource data at RVA {rva:#x} lies outside the file")))
    }

    fn section_for(&self, rva: u32) -> Option<(Section, u32)> {
        self.sections
            .iter()
            .find_map(|s| s.offset_of(rva).map(|delta| (*s, delta)))
    }
}

/// `base + delta` as a file offset, if it fits the address space
fn file_offset(base: u32, delta: u32) -> Option<usize> {
    usize::try_from(base)
        .ok()?
        .checked_add(usize::try_from(delta).ok()?)
}

fn not_executable(detail: &str) -> IconError {
    IconError::NotAnExecutable(detail.to_string())
}

fn truncated(_: std::io::Error) -> IconError {
    not_executable("truncated headers")
}

fn corrupt(detail: &str) -> IconError {
    IconError::CorruptResourceTable(detail.to_string())
}
