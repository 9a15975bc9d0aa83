//! Label mask storage and loaders.
//!
//! This module provides:
//! - `LabelMask`: immutable H×W raster of object ids (0 = background)
//! - `MaskLoaderRegistry`: extensible system for loading mask files
//! - Built-in loaders for TIFF/PNG label images and NumPy (.npy) arrays
//!
//! ## Adding New Formats
//!
//! 1. Create a new loader in `loaders/` implementing `MaskLoader`
//! 2. Register it in `MaskLoaderRegistry::new()`

mod loader;
pub mod loaders;
mod mask;

pub use loader::{LoaderError, MaskLoader, MaskLoaderRegistry};
pub use mask::LabelMask;
