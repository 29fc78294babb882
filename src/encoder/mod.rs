//! Icon container encoding
//!
//! Serializes icon variants into a single standalone `.ico` byte buffer. The
//! layout is computed before anything is written: every entry is planned with
//! its final payload, offsets are derived from the planned sizes, and the
//! buffer is then filled in one pass and checked against the computed length.

mod dib;

pub use dib::{TranscodedDib, png_to_dib};

use crate::container::{ENTRY_SIZE, HEADER_SIZE, ICON_TYPE, MAX_DIRECTORY_DIMENSION, dimension_byte};
use crate::error::{IconError, Result};
use crate::reader::{IconPayload, IconVariant};
use std::borrow::Cow;
use tracing::{debug, warn};

/// How a variant is carried into the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// Payload copied byte for byte
    Verbatim,
    /// PNG payload decoded and rewritten as a DIB
    TranscodeToDib,
    /// Left out of the container
    Skip,
}

impl EntryFormat {
    /// Decide how `variant` is encoded
    ///
    /// With `prefer_png` set, PNG payloads are kept as they are. Without it, a
    /// PNG of at most 256 pixels per side becomes a DIB and a larger one is
    /// dropped. Bitmap payloads larger than 256 pixels are always dropped,
    /// since only PNG entries may exceed the directory's dimension range.
    pub fn for_variant(variant: &IconVariant, prefer_png: bool) -> Self {
        let oversized =
            variant.width > MAX_DIRECTORY_DIMENSION || variant.height > MAX_DIRECTORY_DIMENSION;

        match (&variant.payload, prefer_png, oversized) {
            (IconPayload::Dib(_), _, true) => Self::Skip,
            (IconPayload::Dib(_), _, false) | (IconPayload::Png(_), true, _) => Self::Verbatim,
            (IconPayload::Png(_), false, false) => Self::TranscodeToDib,
            (IconPayload::Png(_), false, true) => Self::Skip,
        }
    }
}

/// A directory entry with its final payload
struct PlannedEntry<'a> {
    width: u32,
    height: u32,
    color_count: u8,
    planes: u16,
    bit_count: u16,
    data: Cow<'a, [u8]>,
}

impl<'a> PlannedEntry<'a> {
    fn plan(variant: &'a IconVariant, prefer_png: bool) -> Result<Option<Self>> {
        let entry = match EntryFormat::for_variant(variant, prefer_png) {
            EntryFormat::Skip => {
                warn!(
                    "Dropping {}x{} icon image #{}: not representable",
                    variant.width, variant.height, variant.resource_id
                );
                return Ok(None);
            }
            EntryFormat::Verbatim => Self {
                width: variant.width,
                height: variant.height,
                color_count: variant.color_count,
                planes: variant.planes,
                bit_count: variant.bit_count,
                data: Cow::Borrowed(variant.payload.as_bytes()),
            },
            EntryFormat::TranscodeToDib => {
                let dib = png_to_dib(variant.payload.as_bytes(), variant.resource_id)?;
                Self {
                    width: variant.width,
                    height: variant.height,
                    color_count: dib.color_count,
                    planes: 1,
                    bit_count: dib.bit_count,
                    data: Cow::Owned(dib.data),
                }
            }
        };
        Ok(Some(entry))
    }
}

/// Encode variants, in the given order, into an icon container
///
/// # Errors
///
/// - [`IconError::EmptyInput`] if `variants` is empty or every variant is dropped
/// - [`IconError::CorruptImage`] if a PNG that must be transcoded cannot be decoded
/// - [`IconError::EncodeError`] if the layout does not fit the container's 32-bit
///   offsets, or the written buffer disagrees with the planned layout
pub fn encode(variants: &[IconVariant], prefer_png: bool) -> Result<Vec<u8>> {
    if variants.is_empty() {
        return Err(IconError::EmptyInput);
    }

    let entries = variants
        .iter()
        .map(|variant| PlannedEntry::plan(variant, prefer_png))
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>>>()?;

    if entries.is_empty() {
        return Err(IconError::EmptyInput);
    }

    let count = u16::try_from(entries.len())
        .map_err(|_| IconError::EncodeError(format!("{} entries exceed the directory", entries.len())))?;

    // Pass one: sizes and offsets
    let mut layout = Vec::with_capacity(entries.len());
    let mut offset = HEADER_SIZE as u64 + (entries.len() * ENTRY_SIZE) as u64;
    for entry in &entries {
        let size = entry.data.len() as u64;
        let (Ok(size32), Ok(offset32)) = (u32::try_from(size), u32::try_from(offset)) else {
            return Err(IconError::EncodeError(format!(
                "entry at offset {offset} with {size} bytes exceeds 32-bit range"
            )));
        };
        layout.push((size32, offset32));
        offset += size;
    }
    let total = usize::try_from(offset)
        .map_err(|_| IconError::EncodeError(format!("container of {offset} bytes is too large")))?;

    // Pass two: write
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&ICON_TYPE.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());

    for (entry, (size, offset)) in entries.iter().zip(&layout) {
        out.push(dimension_byte(entry.width));
        out.push(dimension_byte(entry.height));
        out.push(entry.color_count);
        out.push(0);
        out.extend_from_slice(&entry.planes.to_le_bytes());
        out.extend_from_slice(&entry.bit_count.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }

    for entry in &entries {
        out.extend_from_slice(&entry.data);
    }

    if out.len() != total {
        return Err(IconError::EncodeError(format!(
            "wrote {} bytes, layout expected {total}",
            out.len()
        )));
    }

    debug!("Encoded {} of {} icon images into {} bytes", count, variants.len(), total);
    Ok(out)
}
