//! PNG to DIB transcoding
//!
//! Classic icon consumers only understand bitmap payloads. A PNG variant is
//! decoded and handed to the `ico` crate, which writes a `BITMAPINFOHEADER`
//! image and its transparency mask at the smallest lossless depth: 32 bpp as
//! soon as any pixel is partially transparent, a palette or 24 bpp otherwise.

use crate::error::{IconError, Result};
use ico::{IconDirEntry, IconImage};
use image::ImageFormat;

/// A bitmap payload produced from a PNG variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedDib {
    /// Bits per pixel chosen by the encoder
    pub bit_count: u16,
    /// Palette size for the directory (0 for 8 bpp and up)
    pub color_count: u8,
    /// Headerless DIB: info header, palette, XOR rows, AND mask
    pub data: Vec<u8>,
}

/// Decode a PNG variant and re-encode it as an icon DIB
///
/// # Errors
///
/// Returns [`IconError::CorruptImage`] if the PNG stream cannot be decoded, and
/// [`IconError::EncodeError`] if the decoded image cannot be written as a bitmap.
pub fn png_to_dib(png: &[u8], resource_id: u16) -> Result<TranscodedDib> {
    let rgba = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|source| IconError::CorruptImage {
            resource_id,
            source,
        })?
        .to_rgba8();

    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(IconError::EncodeError(format!(
            "icon image #{resource_id} decoded to {width}x{height}"
        )));
    }

    let image = IconImage::from_rgba_data(width, height, rgba.into_raw());
    let entry = IconDirEntry::encode_as_bmp(&image).map_err(|e| {
        IconError::EncodeError(format!("icon image #{resource_id} as bitmap: {e}"))
    })?;

    let bit_count = entry.bits_per_pixel();
    Ok(TranscodedDib {
        bit_count,
        color_count: palette_entries(bit_count),
        data: entry.data().to_vec(),
    })
}

/// Directory `color_count` for a bitmap depth
fn palette_entries(bit_count: u16) -> u8 {
    match bit_count {
        1 => 2,
        4 => 16,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgba, RgbaImage};

    fn encode_png(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Gradient with translucent pixels, which forces 32 bpp
    fn translucent(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 5) as u8, (y * 5) as u8, 0x40, if x == 0 { 0 } else { 0x80 }])
        })
    }

    #[test]
    fn test_header_fields() {
        let dib = png_to_dib(&encode_png(&translucent(48, 48)), 1).unwrap();
        let data = &dib.data;

        assert_eq!(dib.bit_count, 32);
        assert_eq!(dib.color_count, 0);
        assert_eq!(u32::from_le_bytes(data[0..4].try_into().unwrap()), 40);
        assert_eq!(u32::from_le_bytes(data[4..8].try_into().unwrap()), 48);
        assert_eq!(u32::from_le_bytes(data[8..12].try_into().unwrap()), 96);
        assert_eq!(u16::from_le_bytes(data[12..14].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(data[14..16].try_into().unwrap()), 32);
        // 48 px of mask round up to two DWORDs per row
        assert_eq!(data.len(), 40 + 48 * 48 * 4 + 8 * 48);
    }

    #[test]
    fn test_rows_are_bottom_up_bgra() {
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0x80]));
        image.put_pixel(0, 0, Rgba([10, 20, 30, 0x80]));
        let dib = png_to_dib(&encode_png(&image), 1).unwrap();

        // Top-left pixel is the first pixel of the last stored row
        let last_row = 40 + 2 * 4;
        assert_eq!(&dib.data[last_row..last_row + 4], &[30, 20, 10, 0x80]);
    }

    #[test]
    fn test_opaque_image_uses_smaller_depth() {
        let image = RgbaImage::from_fn(4, 4, |x, _| Rgba([(x * 60) as u8, 0, 0, 0xFF]));
        let dib = png_to_dib(&encode_png(&image), 1).unwrap();

        assert_eq!(dib.bit_count, 4);
        assert_eq!(dib.color_count, 16);
        assert_eq!(u16::from_le_bytes(dib.data[14..16].try_into().unwrap()), 4);
    }

    #[test]
    fn test_pixels_survive_transcoding() {
        let source = translucent(20, 12);
        let dib = png_to_dib(&encode_png(&source), 1).unwrap();

        let mut ico = Vec::new();
        let mut directory = ico::IconDir::new(ico::ResourceType::Icon);
        directory.add_entry(IconDirEntry::encode_as_bmp(&IconImage::from_rgba_data(
            20,
            12,
            source.clone().into_raw(),
        ))
        .unwrap());
        directory.write(&mut ico).unwrap();

        let read = ico::IconDir::read(std::io::Cursor::new(&ico)).unwrap();
        assert_eq!(read.entries()[0].data(), dib.data.as_slice());
        let decoded = read.entries()[0].decode().unwrap();
        assert_eq!(decoded.rgba_data(), source.as_raw().as_slice());
    }

    #[test]
    fn test_undecodable_png_is_corrupt_image() {
        let mut broken = crate::test_utils::png_image(16, 16);
        broken.truncate(40);

        let err = png_to_dib(&broken, 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptImage);
        assert!(err.to_string().contains('9'));
    }
}
