//! Global constants for the review engine.

/// Alpha applied to every object in the overview overlay.
pub const DEFAULT_LOW_ALPHA: u8 = 128;

/// Alpha used for the isolated object and the hovered object.
pub const FULL_ALPHA: u8 = 255;

/// Objects with at most this many pixels are reported as dead pixels.
pub const DEFAULT_DEAD_PIXEL_THRESHOLD: u64 = 10;

/// Share of objects drawn for a double-check pass, in percent.
pub const DEFAULT_DOUBLE_CHECK_PERCENTAGE: f64 = 5.0;

/// Prefix of the object token written to ledger files (`label_<id>`).
pub const LABEL_PREFIX: &str = "label_";

/// State literal of the row that stores the reviewer's cursor.
pub const CURRENT_INDEX_STATE: &str = "Current index";

/// File stem suffix used for double-check ledgers.
pub const DOUBLE_CHECK_SUFFIX: &str = "_double_check";
