//! Error types for ledger file operations.

use thiserror::Error;

use crate::model::ObjectId;

/// Errors that can occur while reading or writing ledger files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Structure or content of the ledger is invalid
    #[error("Malformed ledger: {message}")]
    MalformedLedger {
        /// Description of the problem
        message: String,
    },

    /// The ledger names an object the mask does not contain
    #[error("Ledger references unknown object {id}")]
    UnknownObject {
        /// The id missing from the mask
        id: ObjectId,
    },
}

impl FormatError {
    /// Create a malformed ledger error with a message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedLedger {
            message: message.into(),
        }
    }

    /// Whether the ledger disagrees with the loaded mask rather than being
    /// unreadable.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, FormatError::UnknownObject { .. })
    }
}
