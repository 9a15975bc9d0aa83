//! Loader for NumPy `.npy` label masks.
//!
//! Accepts 2D integer arrays of shape `(H, W)`. Negative values, or values
//! that do not fit in a `u32`, are rejected.

use std::io::Cursor;

use ndarray::Array2;
use ndarray_npy::{ReadNpyExt, ReadableElement};

use crate::data::LabelMask;
use crate::data::loader::{LoaderError, MaskLoader};

use super::{LabelValue, labels_from};

/// Loader for NumPy `.npy` files.
pub struct NpyMaskLoader;

impl NpyMaskLoader {
    /// NumPy magic bytes: \x93NUMPY
    const MAGIC: &'static [u8] = &[0x93, b'N', b'U', b'M', b'P', b'Y'];

    fn try_read<T>(data: &[u8]) -> Option<Result<LabelMask, LoaderError>>
    where
        T: ReadableElement + LabelValue + Copy,
    {
        let array = Array2::<T>::read_npy(Cursor::new(data)).ok()?;
        Some(Self::array_to_mask(array))
    }

    fn array_to_mask<T: LabelValue + Copy>(array: Array2<T>) -> Result<LabelMask, LoaderError> {
        let (height, width) = array.dim();
        log::debug!("NpyMaskLoader: array shape = ({}, {})", height, width);

        let cells = labels_from("npy", array.iter().copied())?;
        LabelMask::from_vec(height, width, cells)
    }
}

impl MaskLoader for NpyMaskLoader {
    fn id(&self) -> &'static str {
        "npy"
    }

    fn display_name(&self) -> &'static str {
        "NumPy Label Array (.npy)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npy"]
    }

    fn can_load(&self, data: &[u8]) -> bool {
        data.starts_with(Self::MAGIC)
    }

    fn load(&self, data: &[u8]) -> Result<LabelMask, LoaderError> {
        // Label arrays are integer typed; int64 is NumPy's default.
        Self::try_read::<i64>(data)
            .or_else(|| Self::try_read::<i32>(data))
            .or_else(|| Self::try_read::<u32>(data))
            .or_else(|| Self::try_read::<u16>(data))
            .or_else(|| Self::try_read::<u8>(data))
            .or_else(|| Self::try_read::<u64>(data))
            .or_else(|| Self::try_read::<i16>(data))
            .or_else(|| Self::try_read::<i8>(data))
            .unwrap_or_else(|| {
                Err(LoaderError::decode(
                    "npy",
                    "Failed to read NumPy array: expected a 2D integer array",
                ))
            })
    }

    fn priority(&self) -> i32 {
        // Checked before generic images since the magic bytes are unambiguous
        10
    }
}
