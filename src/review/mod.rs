//! Review workflow: decisions, navigation, double checks and sessions.

mod double_check;
mod ledger;
mod navigation;
mod session;

#[cfg(test)]
mod tests;

pub use double_check::{DoubleCheckEntry, DoubleCheckLedger, DoubleCheckSampler, DoubleCheckSession};
pub use ledger::{AnnotationLedger, LedgerEntry};
pub use navigation::{Navigation, NavigationCursor};
pub use session::{ObjectListItem, OverlayLayers, ReviewSession, SessionError};
