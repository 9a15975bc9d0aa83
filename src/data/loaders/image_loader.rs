//! Loader for label masks stored as standard raster images (TIFF, PNG).
//!
//! Grayscale images map pixel values directly to object ids. RGB(A) images
//! are treated as packed 24-bit ids (`r << 16 | g << 8 | b`), which is how
//! several segmentation tools export more than 65535 labels.

use image::DynamicImage;

use crate::data::LabelMask;
use crate::data::loader::{LoaderError, MaskLoader};

/// Loader for TIFF/PNG label masks.
pub struct ImageMaskLoader;

impl ImageMaskLoader {
    fn to_mask(img: DynamicImage) -> Result<LabelMask, LoaderError> {
        let width = img.width() as usize;
        let height = img.height() as usize;

        let cells: Vec<u32> = match img {
            DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(u32::from).collect(),
            DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(u32::from).collect(),
            DynamicImage::ImageLumaA8(buf) => buf.pixels().map(|p| u32::from(p[0])).collect(),
            DynamicImage::ImageLumaA16(buf) => buf.pixels().map(|p| u32::from(p[0])).collect(),
            DynamicImage::ImageRgb8(buf) => buf.pixels().map(|p| pack_rgb(p.0)).collect(),
            DynamicImage::ImageRgba8(buf) => buf
                .pixels()
                .map(|p| pack_rgb([p[0], p[1], p[2]]))
                .collect(),
            other => {
                return Err(LoaderError::decode(
                    "image",
                    format!("unsupported pixel layout {:?} for a label mask", other.color()),
                ));
            }
        };

        log::trace!("ImageMaskLoader: decoded {}x{} mask", width, height);
        LabelMask::from_vec(height, width, cells)
    }
}

fn pack_rgb([r, g, b]: [u8; 3]) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

impl MaskLoader for ImageMaskLoader {
    fn id(&self) -> &'static str {
        "image"
    }

    fn display_name(&self) -> &'static str {
        "Label Image (TIFF/PNG)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tiff", "tif", "png"]
    }

    fn can_load(&self, data: &[u8]) -> bool {
        if data.len() < 8 {
            return false;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return true;
        }

        // TIFF: 49 49 2A 00 (little endian) or 4D 4D 00 2A (big endian)
        data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    }

    fn load(&self, data: &[u8]) -> Result<LabelMask, LoaderError> {
        let img = image::load_from_memory(data)
            .map_err(|e| LoaderError::decode("image", format!("Failed to decode image: {}", e)))?;
        Self::to_mask(img)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Luma, Rgb};

    use super::*;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_loader_metadata() {
        let loader = ImageMaskLoader;
        assert_eq!(loader.id(), "image");
        assert!(loader.extensions().contains(&"tiff"));
        assert!(loader.extensions().contains(&"png"));
    }

    #[test]
    fn test_magic_detection() {
        let loader = ImageMaskLoader;
        assert!(loader.can_load(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
        assert!(loader.can_load(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]));
        assert!(!loader.can_load(&[0x93, b'N', b'U', b'M', b'P', b'Y', 0x01, 0x00]));
    }

    #[test]
    fn test_load_luma16_png() {
        let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(3, 2, vec![0, 700, 700, 0, 0, 65535]).unwrap();
        let bytes = encode(DynamicImage::ImageLuma16(buf), ImageFormat::Png);

        let mask = ImageMaskLoader.load(&bytes).unwrap();
        assert_eq!(mask.width(), 3);
        assert_eq!(mask.height(), 2);
        assert_eq!(mask.get(0, 1), Some(700));
        assert_eq!(mask.get(1, 2), Some(65535));
    }

    #[test]
    fn test_load_luma8_tiff() {
        let buf: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(2, 2, vec![0, 1, 2, 0]).unwrap();
        let bytes = encode(DynamicImage::ImageLuma8(buf), ImageFormat::Tiff);

        let mask = ImageMaskLoader.load(&bytes).unwrap();
        assert_eq!(mask.get(0, 1), Some(1));
        assert_eq!(mask.get(1, 0), Some(2));
    }

    #[test]
    fn test_rgb_packs_ids() {
        let buf: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(1, 1, vec![0x01, 0x02, 0x03]).unwrap();
        let mask = ImageMaskLoader::to_mask(DynamicImage::ImageRgb8(buf)).unwrap();
        assert_eq!(mask.get(0, 0), Some(0x010203));
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = ImageMaskLoader.load(&[0x49, 0x49, 0x2A, 0x00, 1, 2, 3, 4]);
        assert!(matches!(err, Err(LoaderError::Decode { .. })));
    }
}
