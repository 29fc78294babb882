//! Icon variants and groups
//!
//! An [`IconVariant`] is one image of a logical icon, exactly as stored in an
//! `RT_ICON` resource: either a headerless DIB (BMP without its file header) or a
//! complete PNG stream. Dimensions are taken from the image payload itself; the
//! group directory stores them in a single byte and cannot describe images
//! larger than 256 pixels.

use std::cmp::Reverse;
use std::fmt;

/// PNG file signature
pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Name of a resource inside a module's resource table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceName {
    /// Integer identifier (`MAKEINTRESOURCE`)
    Id(u16),
    /// String name, stored as UTF-16 in the module
    Name(String),
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Encoded image data of a variant
#[derive(Clone, PartialEq, Eq)]
pub enum IconPayload {
    /// Device-independent bitmap: `BITMAPINFOHEADER`, palette, XOR pixels, AND mask
    Dib(Vec<u8>),
    /// Complete PNG stream
    Png(Vec<u8>),
}

impl IconPayload {
    /// Classify raw resource bytes by their signature
    pub fn from_bytes(data: Vec<u8>) -> Self {
        if is_png(&data) {
            Self::Png(data)
        } else {
            Self::Dib(data)
        }
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Dib(data) | Self::Png(data) => data,
        }
    }

    /// Whether the payload is a PNG stream
    pub fn is_png(&self) -> bool {
        matches!(self, Self::Png(_))
    }
}

impl fmt::Debug for IconPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dib(data) => write!(f, "Dib({} bytes)", data.len()),
            Self::Png(data) => write!(f, "Png({} bytes)", data.len()),
        }
    }
}

/// One image of an icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconVariant {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels (of the color image, not the doubled DIB height)
    pub height: u32,
    /// Palette size as declared by the group directory (0 for 8 bpp and up)
    pub color_count: u8,
    /// Color planes as declared by the group directory
    pub planes: u16,
    /// Bits per pixel
    pub bit_count: u16,
    /// `RT_ICON` resource id the image was read from
    pub resource_id: u16,
    /// Image data
    pub payload: IconPayload,
}

impl IconVariant {
    /// Build a variant from a group directory record and its `RT_ICON` data
    ///
    /// The payload header wins over the directory record for dimensions and
    /// depth. The record is used when the payload header cannot be read, and
    /// for any dimension the header gives as 0.
    pub fn from_resource(
        entry_width: u8,
        entry_height: u8,
        color_count: u8,
        planes: u16,
        bit_count: u16,
        resource_id: u16,
        data: Vec<u8>,
    ) -> Self {
        let payload = IconPayload::from_bytes(data);
        let header = match &payload {
            IconPayload::Png(data) => png_header(data),
            IconPayload::Dib(data) => dib_header(data),
        };

        let record_width = dimension_from_byte(entry_width);
        let record_height = dimension_from_byte(entry_height);
        let (width, height, header_bits) = match header {
            Some((width, height, bits)) => (
                if width == 0 { record_width } else { width },
                if height == 0 { record_height } else { height },
                bits,
            ),
            None => (record_width, record_height, 0),
        };

        Self {
            width,
            height,
            color_count,
            planes,
            bit_count: if bit_count == 0 { header_bits } else { bit_count },
            resource_id,
            payload,
        }
    }

    /// Pixel area, used for ordering
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One `RT_GROUP_ICON` resource with its images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconGroup {
    /// Resource name of the group
    pub name: ResourceName,
    /// Images, largest and deepest first
    pub variants: Vec<IconVariant>,
}

impl IconGroup {
    /// Create a group, putting its variants in canonical order
    pub fn new(name: ResourceName, mut variants: Vec<IconVariant>) -> Self {
        sort_variants(&mut variants);
        Self { name, variants }
    }
}

/// Order variants by descending pixel area, then descending bit depth
///
/// The sort is stable: variants that tie keep their directory order.
pub fn sort_variants(variants: &mut [IconVariant]) {
    variants.sort_by_key(|v| (Reverse(v.area()), Reverse(v.bit_count)));
}

/// Whether `data` starts with the PNG signature
pub(crate) fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Directory byte to pixel count (`0` means 256)
pub(crate) fn dimension_from_byte(value: u8) -> u32 {
    if value == 0 { 256 } else { u32::from(value) }
}

/// Width, height and bits per pixel from a PNG `IHDR` chunk
fn png_header(data: &[u8]) -> Option<(u32, u32, u16)> {
    // signature(8) + chunk length(4) + "IHDR"(4) + width(4) + height(4) + depth(1) + color type(1)
    if data.len() < 26 || &data[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    let channels = match data[25] {
        2 => 3,
        4 => 2,
        6 => 4,
        // grayscale and palette
        _ => 1,
    };
    Some((width, height, u16::from(data[24]) * channels))
}

/// Width, height and bits per pixel from a DIB header
///
/// Handles `BITMAPCOREHEADER` (12 bytes) and `BITMAPINFOHEADER` and its
/// extensions (40+ bytes). The stored height covers the XOR image and the AND
/// mask, so it is halved.
fn dib_header(data: &[u8]) -> Option<(u32, u32, u16)> {
    let header_size = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
    match header_size {
        12 => {
            let width = u16::from_le_bytes(data.get(4..6)?.try_into().ok()?);
            let height = u16::from_le_bytes(data.get(6..8)?.try_into().ok()?);
            let bits = u16::from_le_bytes(data.get(10..12)?.try_into().ok()?);
            Some((u32::from(width), u32::from(height) / 2, bits))
        }
        40.. => {
            let width = i32::from_le_bytes(data.get(4..8)?.try_into().ok()?);
            let height = i32::from_le_bytes(data.get(8..12)?.try_into().ok()?);
            let bits = u16::from_le_bytes(data.get(14..16)?.try_into().ok()?);
            Some((width.unsigned_abs(), height.unsigned_abs() / 2, bits))
        }
        _ => None,
    }
}
