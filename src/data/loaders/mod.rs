//! Built-in label mask loaders.
//!
//! This module contains implementations of the `MaskLoader` trait
//! for the supported file formats.

mod image_loader;
mod npy_loader;
mod tiff_loader;

pub use image_loader::ImageMaskLoader;
pub use npy_loader::NpyMaskLoader;
pub use tiff_loader::TiffMaskLoader;

use super::loader::LoaderError;

/// Conversion from a stored integer sample to an object id.
///
/// On failure the offending value is returned widened to `i128`.
trait LabelValue {
    fn to_label(self) -> Result<u32, i128>;
}

macro_rules! impl_label_value {
    ($($ty:ty),*) => {
        $(
            impl LabelValue for $ty {
                fn to_label(self) -> Result<u32, i128> {
                    u32::try_from(self).map_err(|_| i128::from(self))
                }
            }
        )*
    };
}

impl_label_value!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Convert samples to object ids, failing on the first negative or
/// oversized value.
fn labels_from<T: LabelValue>(
    loader: &'static str,
    values: impl IntoIterator<Item = T>,
) -> Result<Vec<u32>, LoaderError> {
    values
        .into_iter()
        .map(|value| {
            value
                .to_label()
                .map_err(|value| LoaderError::InvalidLabel { loader, value })
        })
        .collect()
}
