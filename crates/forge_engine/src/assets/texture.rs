//! Image loading and decoded pixel data.

use std::path::Path;

use super::AssetError;

/// Decoded image pixels, always stored as tightly packed RGBA8.
///
/// Images loaded from disk are converted to RGBA regardless of their
/// source format, so the renderer only ever deals with one pixel layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Raw pixel bytes, `width * height * 4` of them.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel. Always 4 after decoding.
    pub channels: u8,
}

impl TextureData {
    /// Load and decode an image file. Format is detected from the contents.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            AssetError::LoadFailed(format!("failed to decode {}: {e}", path.display()))
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        })
    }

    /// Decode an image from an in-memory byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("failed to decode image bytes: {e}")))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        })
    }

    /// Wrap raw RGBA8 pixels produced elsewhere, checking the byte count
    /// matches the dimensions.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels: 4,
        })
    }

    /// A uniformly colored image, useful as a placeholder or fallback.
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&color);
        }
        Self {
            data,
            width,
            height,
            channels: 4,
        }
    }

    /// Total size of the pixel data in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether both dimensions are powers of two.
    pub fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_fills_every_pixel() {
        let image = TextureData::solid_color(4, 2, [255, 0, 128, 255]);
        assert_eq!(image.width, 4);
        assert_eq!(image.height, 2);
        assert_eq!(image.size_bytes(), 4 * 2 * 4);
        for pixel in image.data.chunks_exact(4) {
            assert_eq!(pixel, &[255, 0, 128, 255]);
        }
    }

    #[test]
    fn from_rgba8_rejects_wrong_length() {
        let result = TextureData::from_rgba8(2, 2, vec![0u8; 15]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn from_rgba8_accepts_exact_length() {
        let image = TextureData::from_rgba8(2, 2, vec![7u8; 16]).unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.height, 2);
        assert_eq!(image.channels, 4);
    }

    #[test]
    fn power_of_two_detection() {
        assert!(TextureData::solid_color(256, 128, [0; 4]).is_power_of_two());
        assert!(!TextureData::solid_color(300, 256, [0; 4]).is_power_of_two());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(TextureData::from_bytes(&[1, 2, 3, 4]).is_err());
    }
}
