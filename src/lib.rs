//! maskreview - label-mask review engine
//!
//! Core of a tool for reviewing instance-segmentation masks of microscopy
//! images. A reviewer pages through the objects of a label mask, accepts or
//! rejects each one, and can audit their work with a sampled double check.
//!
//! The crate provides:
//! - mask loading (TIFF/PNG label images, NumPy arrays) in [`data`]
//! - per-object metadata and stable colors in [`model`]
//! - overview, isolated and highlight overlays built in [`overlay`]
//! - detection of disconnected and tiny objects in [`analysis`]
//! - decision ledgers, double checks and the [`ReviewSession`] in [`review`]
//! - CSV persistence in [`format`]

pub mod analysis;
pub mod color_utils;
pub mod config;
pub mod constants;
pub mod data;
pub mod format;
pub mod model;
pub mod overlay;
pub mod review;

pub use config::ReviewConfig;
pub use data::{LabelMask, MaskLoaderRegistry};
pub use model::{DecisionState, ObjectId, ObjectRegistry};
pub use review::{Navigation, ReviewSession, SessionError};
