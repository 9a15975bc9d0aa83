//! Loader for single-channel integer TIFF label masks.
//!
//! Masks with more than 65535 objects are usually stored as 32-bit TIFFs,
//! which the generic image decoder does not read. This loader decodes any
//! integer grayscale TIFF directly; color TIFFs are left to
//! [`ImageMaskLoader`](super::ImageMaskLoader).

use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};

use crate::data::LabelMask;
use crate::data::loader::{LoaderError, MaskLoader};

use super::labels_from;

/// Loader for grayscale TIFF label masks of any integer width.
pub struct TiffMaskLoader;

impl TiffMaskLoader {
    fn error(err: tiff::TiffError) -> LoaderError {
        LoaderError::decode("tiff", format!("Failed to decode TIFF: {}", err))
    }
}

impl MaskLoader for TiffMaskLoader {
    fn id(&self) -> &'static str {
        "tiff"
    }

    fn display_name(&self) -> &'static str {
        "Integer Label TIFF"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tiff", "tif"]
    }

    fn can_load(&self, data: &[u8]) -> bool {
        data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    }

    fn load(&self, data: &[u8]) -> Result<LabelMask, LoaderError> {
        // Label masks of large plates exceed the default decoder limits.
        let mut decoder = Decoder::new(Cursor::new(data))
            .map_err(Self::error)?
            .with_limits(Limits::unlimited());

        let color = decoder.colortype().map_err(Self::error)?;
        if !matches!(color, ColorType::Gray(_)) {
            return Err(LoaderError::decode(
                "tiff",
                format!("{:?} is not a single-channel label image", color),
            ));
        }

        let (width, height) = decoder.dimensions().map_err(Self::error)?;
        let cells = match decoder.read_image().map_err(Self::error)? {
            DecodingResult::U8(buf) => labels_from("tiff", buf)?,
            DecodingResult::U16(buf) => labels_from("tiff", buf)?,
            DecodingResult::U32(buf) => labels_from("tiff", buf)?,
            DecodingResult::U64(buf) => labels_from("tiff", buf)?,
            DecodingResult::I8(buf) => labels_from("tiff", buf)?,
            DecodingResult::I16(buf) => labels_from("tiff", buf)?,
            DecodingResult::I32(buf) => labels_from("tiff", buf)?,
            DecodingResult::I64(buf) => labels_from("tiff", buf)?,
            _ => {
                return Err(LoaderError::decode(
                    "tiff",
                    "floating-point samples cannot hold object ids",
                ));
            }
        };

        log::trace!("TiffMaskLoader: decoded {}x{} mask", width, height);
        LabelMask::from_vec(height as usize, width as usize, cells)
    }

    fn priority(&self) -> i32 {
        // Ahead of the generic image loader, which handles color TIFFs
        5
    }
}
