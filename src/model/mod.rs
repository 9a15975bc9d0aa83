//! Data models for the review engine.

mod decision;
mod object;

pub use decision::DecisionState;
pub use object::{BoundingBox, ObjectId, ObjectRecord, ObjectRegistry, RegistryError};
