//! In-memory RGBA overlay buffers.

use std::path::Path;

use image::RgbaImage;

use super::OverlayError;

/// H×W×4 RGBA byte buffer, row-major.
///
/// Overlays are derived data. They are handed to the display layer by
/// reference and exported to disk only on request.
#[derive(Clone, PartialEq, Eq)]
pub struct OverlayRaster {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for OverlayRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRaster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl OverlayRaster {
    /// Bytes per RGBA pixel.
    pub const CHANNELS: usize = 4;

    /// Fully transparent raster.
    ///
    /// The buffer is reserved fallibly so an oversized mask is reported as
    /// [`OverlayError::Allocation`] instead of aborting the process.
    pub fn transparent(height: usize, width: usize) -> Result<Self, OverlayError> {
        let bytes = height
            .checked_mul(width)
            .and_then(|n| n.checked_mul(Self::CHANNELS))
            .ok_or(OverlayError::Allocation { bytes: usize::MAX })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|_| OverlayError::Allocation { bytes })?;
        pixels.resize(bytes, 0);

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.height && col < self.width).then(|| (row * self.width + col) * Self::CHANNELS)
    }

    /// RGBA value at `(row, col)`.
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 4]> {
        let i = self.offset(row, col)?;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Overwrite the RGBA value at `(row, col)`. Out-of-range writes are ignored.
    pub fn set_pixel(&mut self, row: usize, col: usize, rgba: [u8; 4]) {
        if let Some(i) = self.offset(row, col) {
            self.pixels[i..i + Self::CHANNELS].copy_from_slice(&rgba);
        }
    }

    /// Overwrite only the alpha channel at `(row, col)`.
    pub fn set_alpha(&mut self, row: usize, col: usize, alpha: u8) {
        if let Some(i) = self.offset(row, col) {
            self.pixels[i + 3] = alpha;
        }
    }

    /// Copy into an `image` buffer for encoding.
    pub fn to_image(&self) -> Result<RgbaImage, OverlayError> {
        let width = u32::try_from(self.width).map_err(|_| OverlayError::too_large(self))?;
        let height = u32::try_from(self.height).map_err(|_| OverlayError::too_large(self))?;
        RgbaImage::from_raw(width, height, self.pixels.clone())
            .ok_or_else(|| OverlayError::too_large(self))
    }

    /// Export losslessly as PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), OverlayError> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        log::info!(
            "Saved {}x{} overlay to {:?}",
            self.width,
            self.height,
            path
        );
        Ok(())
    }
}
