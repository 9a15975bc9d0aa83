//! Ledger persistence.
//!
//! Review progress is stored as CSV so it can be opened in a spreadsheet.
//! Two layouts exist:
//!
//! - **Primary ledger**: `Object Number, Object State, Note`
//! - **Double-check ledger**: `Object Number, Object State 1, Object State 2, Note`
//!
//! Both share the cursor sentinel row described in [`ledger_csv`].

mod auto_save;
mod error;
pub mod ledger_csv;

#[cfg(test)]
mod tests;

pub use auto_save::AutoSaveManager;
pub use error::FormatError;
pub use ledger_csv::{
    DoubleCheckRow, LedgerRow, SentinelRow, cursor_key, label_key, load_rows, parse_cursor_key,
    parse_label_key, read_rows, save_rows, split_at_sentinel, write_rows,
};
