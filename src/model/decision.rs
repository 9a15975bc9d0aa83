//! Reviewer decisions about individual objects.

use crate::color_utils::{ACCEPTED_MARKER, REJECTED_MARKER};

/// Review state of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecisionState {
    /// Not reviewed yet
    #[default]
    Unset,
    /// Accepted by the reviewer
    Yes,
    /// Rejected by the reviewer
    No,
}

impl DecisionState {
    /// Literal written to ledger files.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionState::Unset => "",
            DecisionState::Yes => "Yes",
            DecisionState::No => "No",
        }
    }

    /// Parse a ledger literal. Surrounding whitespace is ignored.
    pub fn parse(literal: &str) -> Option<Self> {
        match literal.trim() {
            "" => Some(DecisionState::Unset),
            "Yes" => Some(DecisionState::Yes),
            "No" => Some(DecisionState::No),
            _ => None,
        }
    }

    /// Whether the reviewer has made a call on the object.
    pub fn is_decided(&self) -> bool {
        !matches!(self, DecisionState::Unset)
    }

    /// List-item marker color, if any.
    pub fn marker_color(&self) -> Option<[u8; 3]> {
        match self {
            DecisionState::Unset => None,
            DecisionState::Yes => Some(ACCEPTED_MARKER),
            DecisionState::No => Some(REJECTED_MARKER),
        }
    }
}
