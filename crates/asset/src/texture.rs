//! Decoded textures and the table that owns them.

use std::collections::BTreeMap;

use gltf::image::{Data, Format};
use image::{DynamicImage, ImageBuffer};

/// Logical index of a texture within its source document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureData {
    /// Wrap raw RGBA8 pixels. Returns `None` when `data` does not hold
    /// exactly `width * height` pixels or a dimension is zero.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let texture = Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        };
        texture.is_valid().then_some(texture)
    }

    /// Convert pixels decoded by the glTF importer into RGBA8. Returns `None`
    /// when the pixel buffer does not match the reported size or the image
    /// is empty.
    pub fn from_gltf(image: Data) -> Option<Self> {
        let Data {
            pixels,
            format,
            width,
            height,
        } = image;
        let img = match format {
            Format::R8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
            Format::R8G8 => {
                ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
            }
            Format::R8G8B8 => {
                ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
            }
            Format::R8G8B8A8 => {
                ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
            }
            Format::R16 => {
                ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageLuma16)
            }
            Format::R16G16 => {
                ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageLumaA16)
            }
            Format::R16G16B16 => {
                ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageRgb16)
            }
            Format::R16G16B16A16 => {
                ImageBuffer::from_raw(width, height, wide(&pixels)).map(DynamicImage::ImageRgba16)
            }
            Format::R32G32B32FLOAT => {
                ImageBuffer::from_raw(width, height, float(&pixels)).map(DynamicImage::ImageRgb32F)
            }
            Format::R32G32B32A32FLOAT => {
                ImageBuffer::from_raw(width, height, float(&pixels)).map(DynamicImage::ImageRgba32F)
            }
        }?;
        let texture = Self::from_image(img);
        texture.is_valid().then_some(texture)
    }

    pub fn from_image(img: DynamicImage) -> Self {
        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            data: rgba.into_raw(),
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            TextureFormat::Rgba8 => 4,
        }
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size =
            self.width as usize * self.height as usize * self.bytes_per_pixel() as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

/// Textures keyed by their document index. The table owns its entries; mesh
/// records only hold [`TextureId`]s into it.
#[derive(Clone, Debug)]
pub struct TextureTable<T> {
    entries: BTreeMap<TextureId, T>,
}

impl<T> Default for TextureTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> TextureTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TextureId, texture: T) -> Option<T> {
        self.entries.insert(id, texture)
    }

    pub fn get(&self, id: TextureId) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Look up an optional reference; a miss and `None` both mean "untextured".
    pub fn resolve(&self, id: Option<TextureId>) -> Option<&T> {
        id.and_then(|id| self.get(id))
    }

    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.entries.keys().copied()
    }

    /// Convert every entry, keeping ids. Entries for which `f` yields `None`
    /// are dropped.
    pub fn filter_map<U>(self, mut f: impl FnMut(TextureId, T) -> Option<U>) -> TextureTable<U> {
        TextureTable {
            entries: self
                .entries
                .into_iter()
                .filter_map(|(id, t)| f(id, t).map(|u| (id, u)))
                .collect(),
        }
    }

    /// Remove and yield every entry in id order.
    pub fn drain(&mut self) -> impl Iterator<Item = (TextureId, T)> {
        std::mem::take(&mut self.entries).into_iter()
    }
}

// 16-bit and float channels arrive as native-endian bytes.
fn wide(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

fn float(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pixel_count() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 15]).is_none());
        assert!(TextureData::from_rgba8(0, 0, vec![]).is_none());
        assert!(TextureData::from_rgba8(2, 1, vec![0; 8]).is_some());
    }

    #[test]
    fn gltf_rgba8_passes_through() {
        let pixels: Vec<u8> = (0..24).collect();
        let data = Data {
            pixels: pixels.clone(),
            format: Format::R8G8B8A8,
            width: 3,
            height: 2,
        };
        let t = TextureData::from_gltf(data).unwrap();
        assert_eq!((t.width, t.height), (3, 2));
        assert_eq!(t.data, pixels);
    }

    #[test]
    fn gltf_rgb8_gains_opaque_alpha() {
        let data = Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let t = TextureData::from_gltf(data).unwrap();
        assert_eq!(t.data, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn gltf_rgba16_is_narrowed() {
        let pixels = [u16::MAX, 0, u16::MAX, u16::MAX]
            .iter()
            .flat_map(|c| c.to_ne_bytes())
            .collect();
        let data = Data {
            pixels,
            format: Format::R16G16B16A16,
            width: 1,
            height: 1,
        };
        assert_eq!(TextureData::from_gltf(data).unwrap().data, vec![255, 0, 255, 255]);
    }

    #[test]
    fn gltf_short_pixel_buffer_is_rejected() {
        let data = Data {
            pixels: vec![0; 7],
            format: Format::R8G8B8A8,
            width: 2,
            height: 1,
        };
        assert!(TextureData::from_gltf(data).is_none());

        let empty = Data {
            pixels: vec![],
            format: Format::R8G8B8A8,
            width: 0,
            height: 0,
        };
        assert!(TextureData::from_gltf(empty).is_none());
    }

    #[test]
    fn table_resolves_only_present_ids() {
        let mut table = TextureTable::new();
        table.insert(TextureId(2), "two");
        assert_eq!(table.resolve(Some(TextureId(2))), Some(&"two"));
        assert_eq!(table.resolve(Some(TextureId(0))), None);
        assert_eq!(table.resolve(None), None);
    }

    #[test]
    fn filter_map_keeps_ids_and_drops_failures() {
        let mut table = TextureTable::new();
        table.insert(TextureId(0), 10);
        table.insert(TextureId(3), 30);
        let mapped = table.filter_map(|id, v| (id.index() != 0).then_some(v * 2));
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped.get(TextureId(3)), Some(&60));
    }

    #[test]
    fn drain_empties_table() {
        let mut table = TextureTable::new();
        table.insert(TextureId(1), ());
        table.insert(TextureId(0), ());
        let ids: Vec<_> = table.drain().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![TextureId(0), TextureId(1)]);
        assert!(table.is_empty());
    }
}
