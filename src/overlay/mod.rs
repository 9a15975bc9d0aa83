//! Overlay rasters and their construction.
//!
//! The overview is expensive (one full-frame pass per object) and is built on
//! the [`OverlayWorker`] thread. Isolated and highlight rasters are cheap and
//! built directly by the caller through [`OverlayCompositor`].

pub mod compositor;
mod raster;
pub mod worker;

pub use compositor::{OverlayCompositor, mask_out};
pub use raster::OverlayRaster;
pub use worker::{OverlayEvent, OverlayJob, OverlayWorker};

use thiserror::Error;

/// Errors raised while building or exporting overlays.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The frame buffer could not be allocated.
    #[error("Failed to allocate {bytes} bytes for overlay raster")]
    Allocation { bytes: usize },

    /// The run was superseded by a newer one.
    #[error("Overlay build cancelled")]
    Cancelled,

    /// A job panicked on the worker thread.
    #[error("Overlay worker panicked: {0}")]
    WorkerPanicked(String),

    /// The worker thread could not be started or has gone away.
    #[error("Overlay worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Encoding or writing the raster failed.
    #[error("Failed to export overlay: {0}")]
    Export(#[from] image::ImageError),

    /// Image and mask sizes differ.
    #[error("Image is {}x{} but mask is {}x{}", image.0, image.1, mask.0, mask.1)]
    DimensionMismatch {
        /// Image `(width, height)`.
        image: (usize, usize),
        /// Mask `(width, height)`.
        mask: (usize, usize),
    },

    /// Raster dimensions exceed what the image encoder accepts.
    #[error("Overlay of {width}x{height} is too large to export")]
    TooLarge { width: usize, height: usize },
}

impl OverlayError {
    /// Create a `TooLarge` error for `raster`.
    pub fn too_large(raster: &OverlayRaster) -> Self {
        Self::TooLarge {
            width: raster.width(),
            height: raster.height(),
        }
    }
}
