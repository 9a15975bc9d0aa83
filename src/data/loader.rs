//! Trait-based label mask loading system.
//!
//! New mask formats can be added by implementing the `MaskLoader` trait and
//! registering the loader in `MaskLoaderRegistry::new()`.
//!
//! ## Supported Formats
//!
//! - **Standard Images**: TIFF and PNG, 8/16-bit grayscale (RGB masks are
//!   read as packed 24-bit ids)
//! - **Integer TIFF**: 8 to 64-bit signed or unsigned grayscale, for masks
//!   with more ids than 16 bits hold
//! - **NumPy Arrays**: 2D integer `.npy` files
//!
//! ## Usage
//!
//! ```rust,ignore
//! use maskreview::data::MaskLoaderRegistry;
//!
//! let registry = MaskLoaderRegistry::new();
//! let mask = registry.load(&bytes, Some("r01c02f02.tiff"))?;
//! ```

use std::path::Path;

use thiserror::Error;

use crate::data::LabelMask;

/// Errors raised while turning file bytes into a [`LabelMask`].
#[derive(Debug, Error)]
pub enum LoaderError {
    /// I/O error while reading the mask file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A loader recognised the data but could not decode it
    #[error("[{loader}] {message}")]
    Decode {
        /// The loader that produced this error
        loader: &'static str,
        /// Human-readable error message
        message: String,
    },

    /// A cell holds a value that is not a valid object id
    #[error("[{loader}] invalid label value {value} (ids must fit in 0..=u32::MAX)")]
    InvalidLabel {
        /// The loader that produced this error
        loader: &'static str,
        /// The offending value
        value: i128,
    },

    /// Array shape does not describe a 2D mask
    #[error("Invalid mask shape: {message}")]
    Shape {
        /// Description of the shape problem
        message: String,
    },

    /// No registered loader accepted the data
    #[error("No loader could handle the data{}", .filename.as_ref().map(|f| format!(" (file: {})", f)).unwrap_or_default())]
    Unsupported {
        /// File name the data came from, if known
        filename: Option<String>,
    },
}

impl LoaderError {
    /// Create a decode error attributed to a loader.
    pub fn decode(loader: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            loader,
            message: message.into(),
        }
    }
}

/// Trait for label mask format loaders.
pub trait MaskLoader: Send + Sync {
    /// Unique identifier for this loader (e.g., "image", "npy").
    fn id(&self) -> &'static str;

    /// Human-readable name for UI display.
    fn display_name(&self) -> &'static str;

    /// File extensions this loader handles (lowercase, without dots).
    fn extensions(&self) -> &'static [&'static str];

    /// Check magic bytes to see whether this loader can likely handle `data`.
    fn can_load(&self, data: &[u8]) -> bool;

    /// Decode raw file bytes into a mask.
    fn load(&self, data: &[u8]) -> Result<LabelMask, LoaderError>;

    /// Priority for format detection (higher = checked first).
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of available mask loaders.
pub struct MaskLoaderRegistry {
    loaders: Vec<Box<dyn MaskLoader>>,
}

impl MaskLoaderRegistry {
    /// Create a new registry with all built-in loaders.
    pub fn new() -> Self {
        let mut registry = Self {
            loaders: Vec::new(),
        };

        registry.register(Box::new(super::loaders::ImageMaskLoader));
        registry.register(Box::new(super::loaders::TiffMaskLoader));
        registry.register(Box::new(super::loaders::NpyMaskLoader));

        registry
    }

    /// Register a new loader.
    pub fn register(&mut self, loader: Box<dyn MaskLoader>) {
        self.loaders.push(loader);
        self.loaders.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Get all supported file extensions (for file filtering).
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .loaders
            .iter()
            .flat_map(|l| l.extensions().iter().copied())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    fn loaders_for_extension(&self, ext: &str) -> impl Iterator<Item = &dyn MaskLoader> {
        let ext_lower = ext.to_lowercase();
        self.loaders
            .iter()
            .filter(move |l| l.extensions().iter().any(|e| *e == ext_lower))
            .map(|l| l.as_ref())
    }

    /// Load a mask, auto-detecting the format.
    ///
    /// Tries loaders matching the file extension first, then magic byte
    /// detection. The error of the last attempted loader is kept so the
    /// caller sees why a recognised file failed to decode.
    pub fn load(&self, data: &[u8], filename: Option<&str>) -> Result<LabelMask, LoaderError> {
        let extension = filename.and_then(|f| f.rsplit_once('.').map(|(_, e)| e.to_lowercase()));
        let mut last_error = None;

        if let Some(ref ext) = extension {
            for loader in self.loaders_for_extension(ext) {
                match loader.load(data) {
                    Ok(mask) => {
                        log::debug!("Loaded mask with {} (by extension)", loader.display_name());
                        return Ok(mask);
                    }
                    Err(e) => {
                        log::trace!("Loader {} failed: {}", loader.id(), e);
                        last_error = Some(e);
                    }
                }
            }
        }

        for loader in self.loaders.iter().filter(|l| l.can_load(data)) {
            match loader.load(data) {
                Ok(mask) => {
                    log::debug!("Loaded mask with {} (by detection)", loader.display_name());
                    return Ok(mask);
                }
                Err(e) => {
                    log::trace!("Detected loader {} failed: {}", loader.id(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LoaderError::Unsupported {
            filename: filename.map(str::to_string),
        }))
    }

    /// Read a mask file from disk.
    pub fn load_path(&self, path: &Path) -> Result<LabelMask, LoaderError> {
        let data = std::fs::read(path)?;
        let filename = path.file_name().and_then(|n| n.to_str());
        let mask = self.load(&data, filename)?;
        log::info!(
            "Loaded {}x{} mask from {:?}",
            mask.width(),
            mask.height(),
            path
        );
        Ok(mask)
    }

    /// Check if a filename has a supported extension.
    pub fn is_supported_file(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.supported_extensions()
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }

    /// Get all registered loaders.
    pub fn loaders(&self) -> &[Box<dyn MaskLoader>] {
        &self.loaders
    }
}

impl Default for MaskLoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_orders_by_priority() {
        let registry = MaskLoaderRegistry::new();
        let ids: Vec<&str> = registry.loaders().iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec!["npy", "tiff", "image"]);
    }

    #[test]
    fn test_supported_extensions() {
        let extensions = MaskLoaderRegistry::new().supported_extensions();
        assert!(extensions.contains(&"tiff"));
        assert!(extensions.contains(&"tif"));
        assert!(extensions.contains(&"png"));
        assert!(extensions.contains(&"npy"));
    }

    #[test]
    fn test_is_supported_file() {
        let registry = MaskLoaderRegistry::new();
        assert!(registry.is_supported_file("r01c02f02.tiff"));
        assert!(registry.is_supported_file("MASK.TIF"));
        assert!(registry.is_supported_file("labels.npy"));
        assert!(!registry.is_supported_file("notes.csv"));
    }

    #[test]
    fn test_unknown_data_is_unsupported() {
        let registry = MaskLoaderRegistry::new();
        let err = registry.load(&[1, 2, 3, 4], Some("mask.bin")).unwrap_err();
        assert!(matches!(err, LoaderError::Unsupported { .. }));
        assert!(err.to_string().contains("mask.bin"));
    }
}
