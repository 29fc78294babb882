#![expect(
    clippy::unwrap_used,
    reason = "Test utilities use .unwrap() for brevity"
)]
#![allow(
    dead_code,
    reason = "Shared with integration tests, each of which uses a different subset"
)]

//! Shared test utilities for `getexeicon` tests.
//!
//! Compiled into the library's unit tests and included by path from the
//! integration tests, so it only depends on `std` and external crates.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that modify the APPDATA environment variable.
static APPDATA_LOCK: Mutex<()> = Mutex::new(());

/// Helper function to create a temporary test directory using tempfile.
/// Returns a `TempDir` that automatically cleans up when dropped.
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// RAII guard that points APPDATA at a temp directory for a test scope and
/// restores the original value when dropped.
///
/// # Safety Considerations
///
/// `std::env::set_var` and `std::env::remove_var` are unsafe because other
/// threads may read the environment concurrently. The guard holds
/// `APPDATA_LOCK` for its whole lifetime, so guarded tests modify APPDATA one
/// at a time, and the original value is restored on drop, including on panic.
pub struct AppdataGuard {
    original: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[expect(
    unsafe_code,
    reason = "Test-only environment modification serialized by APPDATA_LOCK"
)]
impl AppdataGuard {
    /// Create a new guard that sets APPDATA to the given temp directory path.
    pub fn new(temp_dir: &TempDir) -> Self {
        // A previous test panicking while holding the lock does not matter here
        let lock = APPDATA_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let original = std::env::var("APPDATA").ok();
        // SAFETY: APPDATA_LOCK is held until the guard drops
        unsafe {
            std::env::set_var("APPDATA", temp_dir.path());
        }
        Self {
            original,
            _lock: lock,
        }
    }
}

#[expect(
    unsafe_code,
    reason = "Test-only environment restoration serialized by APPDATA_LOCK"
)]
impl Drop for AppdataGuard {
    fn drop(&mut self) {
        // SAFETY: the guard still holds APPDATA_LOCK
        match &self.original {
            Some(original) => unsafe { std::env::set_var("APPDATA", original) },
            None => unsafe { std::env::remove_var("APPDATA") },
        }
    }
}

/// Encode a `width` x `height` RGBA gradient as a PNG stream
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 0x80, 0xFF])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Build a 32 bpp icon DIB: `BITMAPINFOHEADER`, bottom-up BGRA rows, AND mask
///
/// The top-left pixel is fully transparent and flagged in the mask, everything
/// else is opaque.
pub fn dib_image(width: u32, height: u32) -> Vec<u8> {
    let mask_stride = width.div_ceil(32) as usize * 4;
    let mut out = Vec::with_capacity(40 + (width * height * 4) as usize + mask_stride * height as usize);

    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32 * 2).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(width * height * 4).to_le_bytes());
    out.extend_from_slice(&[0; 16]);

    for row in (0..height).rev() {
        for x in 0..width {
            let alpha = if row == 0 && x == 0 { 0 } else { 0xFF };
            out.extend_from_slice(&[0x80, (row % 256) as u8, (x % 256) as u8, alpha]);
        }
    }

    for row in (0..height).rev() {
        let mut mask = vec![0u8; mask_stride];
        if row == 0 {
            mask[0] = 0x80;
        }
        out.extend_from_slice(&mask);
    }
    out
}

/// An image to embed as an `RT_ICON` resource
#[derive(Debug, Clone)]
pub struct FixtureImage {
    /// Square edge length in pixels
    pub size: u32,
    /// Encoded image
    pub bytes: Vec<u8>,
}

impl FixtureImage {
    /// Square 32 bpp DIB
    pub fn dib(size: u32) -> Self {
        Self {
            size,
            bytes: dib_image(size, size),
        }
    }

    /// Square RGBA PNG
    pub fn png(size: u32) -> Self {
        Self {
            size,
            bytes: png_image(size, size),
        }
    }
}

/// Resource name used by the builder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum FixtureName {
    // Declared first so named entries sort ahead of ids
    Name(String),
    Id(u16),
}

#[derive(Debug, Clone)]
struct FixtureGroup {
    name: FixtureName,
    /// (`RT_ICON` id, image)
    icons: Vec<(u16, FixtureImage)>,
}

/// A leaf of the resource tree
struct Leaf {
    name: FixtureName,
    data: Vec<u8>,
    rva_override: Option<u32>,
}

const RT_ICON: u16 = 3;
const RT_GROUP_ICON: u16 = 14;
const PE_OFFSET: usize = 0x40;
const FILE_ALIGNMENT: usize = 0x200;
const RESOURCE_RVA: u32 = 0x1000;
const LANGUAGE_EN_US: u16 = 0x409;

/// Builds minimal PE modules carrying icon resources
///
/// Icon ids are assigned from 1 upwards, across groups, in insertion order.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    groups: Vec<FixtureGroup>,
    next_icon_id: u16,
    dropped_icons: BTreeSet<u16>,
    count_overrides: BTreeMap<u16, u16>,
    rva_overrides: BTreeMap<u16, u32>,
    with_resources: bool,
    pe32_plus: bool,
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PeBuilder {
    /// PE32 module with an empty resource section
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            next_icon_id: 1,
            dropped_icons: BTreeSet::new(),
            count_overrides: BTreeMap::new(),
            rva_overrides: BTreeMap::new(),
            with_resources: true,
            pe32_plus: false,
        }
    }

    /// Add an icon group with an integer id
    pub fn icon_group(self, id: u16, images: &[FixtureImage]) -> Self {
        self.push_group(FixtureName::Id(id), images)
    }

    /// Add an icon group with a string name
    pub fn named_icon_group(self, name: &str, images: &[FixtureImage]) -> Self {
        self.push_group(FixtureName::Name(name.to_string()), images)
    }

    /// Keep the group record for an icon but leave out its `RT_ICON` resource
    pub fn drop_icon(mut self, icon_id: u16) -> Self {
        self.dropped_icons.insert(icon_id);
        self
    }

    /// Write `count` into a group header regardless of its real record count
    pub fn group_count_override(mut self, group_id: u16, count: u16) -> Self {
        self.count_overrides.insert(group_id, count);
        self
    }

    /// Point an icon's data entry at an arbitrary RVA
    pub fn icon_rva_override(mut self, icon_id: u16, rva: u32) -> Self {
        self.rva_overrides.insert(icon_id, rva);
        self
    }

    /// Emit no sections and an empty resource data directory
    pub fn without_resource_section(mut self) -> Self {
        self.with_resources = false;
        self
    }

    /// Emit a PE32+ (64-bit) optional header
    pub fn pe32_plus(mut self, enabled: bool) -> Self {
        self.pe32_plus = enabled;
        self
    }

    fn push_group(mut self, name: FixtureName, images: &[FixtureImage]) -> Self {
        let icons = images
            .iter()
            .map(|image| {
                let id = self.next_icon_id;
                self.next_icon_id += 1;
                (id, image.clone())
            })
            .collect();
        self.groups.push(FixtureGroup { name, icons });
        self
    }

    /// Serialize the module
    pub fn build(&self) -> Vec<u8> {
        let section = if self.with_resources {
            Some(self.resource_section())
        } else {
            None
        };
        let optional_size: usize = if self.pe32_plus { 240 } else { 224 };

        let mut out = vec![0u8; FILE_ALIGNMENT];
        out[0..2].copy_from_slice(b"MZ");
        put_u32(&mut out, 0x3C, PE_OFFSET as u32);

        let coff = PE_OFFSET + 4;
        out[PE_OFFSET..coff].copy_from_slice(b"PE\0\0");
        put_u16(&mut out, coff, if self.pe32_plus { 0x8664 } else { 0x014C });
        put_u16(&mut out, coff + 2, u16::from(section.is_some()));
        put_u16(&mut out, coff + 16, optional_size as u16);
        put_u16(&mut out, coff + 18, 0x0102);

        let optional = coff + 20;
        let (magic, count_offset, directories_offset) = if self.pe32_plus {
            (0x20Bu16, 108, 112)
        } else {
            (0x10Bu16, 92, 96)
        };
        put_u16(&mut out, optional, magic);
        put_u32(&mut out, optional + 32, 0x1000);
        put_u32(&mut out, optional + 36, FILE_ALIGNMENT as u32);
        put_u32(&mut out, optional + 60, FILE_ALIGNMENT as u32);
        put_u32(&mut out, optional + count_offset, 16);

        if let Some(section) = &section {
            let directory = optional + directories_offset + 2 * 8;
            put_u32(&mut out, directory, RESOURCE_RVA);
            put_u32(&mut out, directory + 4, section.len() as u32);

            let header = optional + optional_size;
            out[header..header + 8].copy_from_slice(b".rsrc\0\0\0");
            put_u32(&mut out, header + 8, section.len() as u32);
            put_u32(&mut out, header + 12, RESOURCE_RVA);
            put_u32(&mut out, header + 16, align(section.len(), FILE_ALIGNMENT) as u32);
            put_u32(&mut out, header + 20, FILE_ALIGNMENT as u32);
            put_u32(&mut out, header + 36, 0x4000_0040);

            out.extend_from_slice(section);
            out.resize(align(out.len(), FILE_ALIGNMENT), 0);
        }
        out
    }

    /// Group bodies and icon images, keyed by resource type
    fn leaves(&self) -> BTreeMap<u16, Vec<Leaf>> {
        let mut types: BTreeMap<u16, Vec<Leaf>> = BTreeMap::new();

        for group in &self.groups {
            let real_count = group.icons.len() as u16;
            let count = match group.name {
                FixtureName::Id(id) => self.count_overrides.get(&id).copied().unwrap_or(real_count),
                FixtureName::Name(_) => real_count,
            };

            let mut body = Vec::new();
            body.extend_from_slice(&0u16.to_le_bytes());
            body.extend_from_slice(&1u16.to_le_bytes());
            body.extend_from_slice(&count.to_le_bytes());
            for (id, image) in &group.icons {
                let dimension = u8::try_from(image.size).unwrap_or(0);
                body.extend_from_slice(&[dimension, dimension, 0, 0]);
                body.extend_from_slice(&1u16.to_le_bytes());
                body.extend_from_slice(&32u16.to_le_bytes());
                body.extend_from_slice(&(image.bytes.len() as u32).to_le_bytes());
                body.extend_from_slice(&id.to_le_bytes());
            }

            types.entry(RT_GROUP_ICON).or_default().push(Leaf {
                name: group.name.clone(),
                data: body,
                rva_override: None,
            });

            for (id, image) in &group.icons {
                if self.dropped_icons.contains(id) {
                    continue;
                }
                types.entry(RT_ICON).or_default().push(Leaf {
                    name: FixtureName::Id(*id),
                    data: image.bytes.clone(),
                    rva_override: self.rva_overrides.get(id).copied(),
                });
            }
        }

        for leaves in types.values_mut() {
            leaves.sort_by(|a, b| a.name.cmp(&b.name));
        }
        types
    }

    /// Lay out the resource tree: directories, data entries, names, then data
    fn resource_section(&self) -> Vec<u8> {
        let types = self.leaves();
        let all: Vec<&Leaf> = types.values().flatten().collect();

        let mut offset = 16 + 8 * types.len();
        let mut type_offsets = Vec::new();
        for leaves in types.values() {
            type_offsets.push(offset);
            offset += 16 + 8 * leaves.len();
        }

        let language_offsets: Vec<usize> = all
            .iter()
            .map(|_| {
                let at = offset;
                offset += 16 + 8;
                at
            })
            .collect();
        let entry_offsets: Vec<usize> = all
            .iter()
            .map(|_| {
                let at = offset;
                offset += 16;
                at
            })
            .collect();
        let name_offsets: Vec<Option<usize>> = all
            .iter()
            .map(|leaf| match &leaf.name {
                FixtureName::Name(name) => {
                    let at = offset;
                    offset += 2 + 2 * name.encode_utf16().count();
                    Some(at)
                }
                FixtureName::Id(_) => None,
            })
            .collect();
        offset = align(offset, 8);
        let data_offsets: Vec<usize> = all
            .iter()
            .map(|leaf| {
                let at = offset;
                offset = align(offset + leaf.data.len(), 8);
                at
            })
            .collect();

        let mut out = vec![0u8; offset];
        write_directory_header(&mut out, 0, 0, types.len() as u16);
        for (index, (kind, _)) in types.iter().enumerate() {
            let at = 16 + 8 * index;
            put_u32(&mut out, at, u32::from(*kind));
            put_u32(&mut out, at + 4, type_offsets[index] as u32 | 0x8000_0000);
        }

        let mut leaf_index = 0;
        for (type_index, leaves) in types.values().enumerate() {
            let directory = type_offsets[type_index];
            let named = leaves
                .iter()
                .filter(|l| matches!(l.name, FixtureName::Name(_)))
                .count() as u16;
            write_directory_header(&mut out, directory, named, leaves.len() as u16 - named);

            for (slot, leaf) in leaves.iter().enumerate() {
                let at = directory + 16 + 8 * slot;
                let name_field = match (&leaf.name, name_offsets[leaf_index]) {
                    (FixtureName::Id(id), _) => u32::from(*id),
                    (FixtureName::Name(_), Some(name_at)) => name_at as u32 | 0x8000_0000,
                    (FixtureName::Name(_), None) => unreachable!(),
                };
                put_u32(&mut out, at, name_field);
                put_u32(&mut out, at + 4, language_offsets[leaf_index] as u32 | 0x8000_0000);

                let language = language_offsets[leaf_index];
                write_directory_header(&mut out, language, 0, 1);
                put_u32(&mut out, language + 16, u32::from(LANGUAGE_EN_US));
                put_u32(&mut out, language + 20, entry_offsets[leaf_index] as u32);

                let entry = entry_offsets[leaf_index];
                let rva = leaf
                    .rva_override
                    .unwrap_or(RESOURCE_RVA + data_offsets[leaf_index] as u32);
                put_u32(&mut out, entry, rva);
                put_u32(&mut out, entry + 4, leaf.data.len() as u32);

                if let (FixtureName::Name(name), Some(name_at)) = (&leaf.name, name_offsets[leaf_index]) {
                    let units: Vec<u16> = name.encode_utf16().collect();
                    put_u16(&mut out, name_at, units.len() as u16);
                    for (i, unit) in units.iter().enumerate() {
                        put_u16(&mut out, name_at + 2 + 2 * i, *unit);
                    }
                }

                let data = data_offsets[leaf_index];
                out[data..data + leaf.data.len()].copy_from_slice(&leaf.data);
                leaf_index += 1;
            }
        }
        out
    }
}

fn write_directory_header(out: &mut [u8], at: usize, named: u16, ids: u16) {
    put_u16(out, at + 12, named);
    put_u16(out, at + 14, ids);
}

fn put_u16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn align(value: usize, to: usize) -> usize {
    value.div_ceil(to) * to
}
