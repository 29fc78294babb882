//! ICO container layout
//!
//! ```text
//! ICONDIR        reserved u16 = 0, type u16 = 1, count u16
//! ICONDIRENTRY   width u8, height u8, colors u8, reserved u8,
//!  x count       planes u16, bits u16, size u32, offset u32
//! payloads       in directory order
//! ```
//!
//! All fields are little-endian. A width or height byte of `0` stands for 256
//! or more; readers take the real size from the payload header.
//!
//! Writing is done by [`crate::encoder`]. Reading goes through the `ico` crate.

use crate::error::{IconError, Result};
use ico::{IconDir, ResourceType};
use std::io::Cursor;

/// Size of the `ICONDIR` header
pub const HEADER_SIZE: usize = 6;
/// Size of one `ICONDIRENTRY` record
pub const ENTRY_SIZE: usize = 16;
/// `type` field value for icons (cursors use 2)
pub const ICON_TYPE: u16 = 1;
/// Largest dimension the directory can describe
pub const MAX_DIRECTORY_DIMENSION: u32 = 256;

/// Directory byte for a pixel dimension
///
/// 256 and anything larger are written as `0`; only PNG entries can exceed 256.
pub fn dimension_byte(pixels: u32) -> u8 {
    u8::try_from(pixels).unwrap_or(0)
}

/// One entry of a parsed icon container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Width in pixels, from the payload header when it is readable
    pub width: u32,
    /// Height in pixels, from the payload header when it is readable
    pub height: u32,
    /// Bits per pixel as declared by the directory
    pub bit_count: u16,
    /// Whether the payload is a PNG stream
    pub is_png: bool,
    /// Payload bytes
    pub data: Vec<u8>,
}

impl DirectoryEntry {
    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A parsed icon container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconDirectory {
    /// Entries in directory order
    pub entries: Vec<DirectoryEntry>,
}

impl IconDirectory {
    /// Parse an icon container
    ///
    /// # Errors
    ///
    /// Returns [`IconError::InvalidContainer`] for a malformed header or entry,
    /// a payload outside the buffer, or a cursor (`.cur`) container.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let directory = IconDir::read(Cursor::new(data))
            .map_err(|e| IconError::InvalidContainer(e.to_string()))?;

        if directory.resource_type() != ResourceType::Icon {
            return Err(IconError::InvalidContainer(
                "cursor containers are not icons".to_string(),
            ));
        }

        let entries = directory
            .entries()
            .iter()
            .map(|entry| DirectoryEntry {
                width: entry.width(),
                height: entry.height(),
                bit_count: entry.bits_per_pixel(),
                is_png: entry.is_png(),
                data: entry.data().to_vec(),
            })
            .collect();

        Ok(Self { entries })
    }
}
