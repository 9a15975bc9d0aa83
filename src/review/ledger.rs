//! The reviewer's per-object decision ledger.

use std::collections::HashMap;

use crate::constants::CURRENT_INDEX_STATE;
use crate::format::{
    FormatError, LedgerRow, SentinelRow, cursor_key, label_key, parse_cursor_key,
    parse_label_key, split_at_sentinel,
};
use crate::model::{DecisionState, ObjectId, ObjectRegistry};

/// Decision recorded for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: ObjectId,
    pub state: DecisionState,
    pub note: String,
}

/// Decisions, free-standing notes and the resume cursor of one review pass.
///
/// Entries keep the order in which objects were first decided. Deciding an
/// object again replaces its state and note in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationLedger {
    entries: Vec<LedgerEntry>,
    /// Position of each decided object in `entries`.
    index: HashMap<ObjectId, usize>,
    non_object_notes: Vec<String>,
    cursor: Option<ObjectId>,
}

impl AnnotationLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the decision for `id`.
    ///
    /// The caller is responsible for `id` being a known object.
    pub fn record_decision(&mut self, id: ObjectId, state: DecisionState, note: impl Into<String>) {
        let note = note.into();
        match self.index.get(&id) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.state = state;
                entry.note = note;
            }
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(LedgerEntry { id, state, note });
            }
        }
        log::trace!("Object {} marked {:?}", id, state);
    }

    /// Return `id` to the undecided state.
    pub fn clear_decision(&mut self, id: ObjectId) -> Option<LedgerEntry> {
        let removed = self.index.remove(&id)?;
        let entry = self.entries.remove(removed);
        for (i, later) in self.entries.iter().enumerate().skip(removed) {
            self.index.insert(later.id, i);
        }
        Some(entry)
    }

    /// Append a note that is not tied to an object.
    pub fn record_non_object_note(&mut self, note: impl Into<String>) {
        self.non_object_notes.push(note.into());
    }

    /// Move the resume cursor.
    pub fn set_cursor(&mut self, cursor: Option<ObjectId>) {
        self.cursor = cursor;
    }

    /// Object the reviewer was last looking at.
    pub fn cursor(&self) -> Option<ObjectId> {
        self.cursor
    }

    /// Entries in first-decision order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Free-standing notes in insertion order.
    pub fn non_object_notes(&self) -> &[String] {
        &self.non_object_notes
    }

    fn entry(&self, id: ObjectId) -> Option<&LedgerEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// Decision for `id`, `Unset` when none was recorded.
    pub fn state_of(&self, id: ObjectId) -> DecisionState {
        self.entry(id).map_or(DecisionState::Unset, |e| e.state)
    }

    /// Note for `id`, if the object has an entry.
    pub fn note_of(&self, id: ObjectId) -> Option<&str> {
        self.entry(id).map(|e| e.note.as_str())
    }

    /// List-item marker color for `id`.
    pub fn marker_for(&self, id: ObjectId) -> Option<[u8; 3]> {
        self.state_of(id).marker_color()
    }

    /// Number of objects with a Yes or No decision.
    pub fn checked_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_decided()).count()
    }

    /// Share of `total` objects that are decided; `0.0` when `total` is 0.
    pub fn checked_fraction(&self, total: usize) -> f64 {
        checked_fraction(self.checked_count(), total)
    }

    /// Progress text such as `"12.50% Checked"`.
    pub fn progress_label(&self, total: usize) -> String {
        progress_label(self.checked_fraction(total))
    }

    /// Rows in file order: decisions, the cursor sentinel, then notes.
    pub fn serialize(&self) -> Vec<LedgerRow> {
        let mut rows = Vec::with_capacity(self.entries.len() + 1 + self.non_object_notes.len());
        rows.extend(self.entries.iter().map(|e| LedgerRow {
            object: label_key(e.id),
            state: e.state.as_str().to_string(),
            note: e.note.clone(),
        }));
        rows.push(LedgerRow {
            object: cursor_key(self.cursor),
            state: CURRENT_INDEX_STATE.to_string(),
            note: String::new(),
        });
        rows.extend(self.non_object_notes.iter().map(LedgerRow::note));
        rows
    }

    /// Rebuild a ledger from rows, validating ids against `registry`.
    ///
    /// Nothing is returned unless every row is valid.
    pub fn deserialize(rows: &[LedgerRow], registry: &ObjectRegistry) -> Result<Self, FormatError> {
        let (decisions, sentinel, notes) = split_at_sentinel(rows)?;

        let mut ledger = Self::new();
        for row in decisions {
            let id = known_object(&row.object, registry)?;
            let state = parse_state(&row.state)?;
            ledger.record_decision(id, state, row.note.clone());
        }

        ledger.cursor = restore_cursor(sentinel, registry)?;
        ledger.non_object_notes = collect_notes(notes, |row| &row.note);

        log::debug!(
            "Restored ledger: {} decisions, {} notes, cursor {:?}",
            ledger.entries.len(),
            ledger.non_object_notes.len(),
            ledger.cursor
        );
        Ok(ledger)
    }
}

/// Share of decided objects; `0.0` for an empty registry.
pub(crate) fn checked_fraction(checked: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        checked as f64 / total as f64
    }
}

pub(crate) fn progress_label(fraction: f64) -> String {
    format!("{:.2}% Checked", fraction * 100.0)
}

/// Parse an object token and make sure the mask contains it.
pub(crate) fn known_object(token: &str, registry: &ObjectRegistry) -> Result<ObjectId, FormatError> {
    let id = parse_label_key(token)?;
    if registry.contains(id) {
        Ok(id)
    } else {
        Err(FormatError::UnknownObject { id })
    }
}

pub(crate) fn parse_state(literal: &str) -> Result<DecisionState, FormatError> {
    DecisionState::parse(literal)
        .ok_or_else(|| FormatError::malformed(format!("unknown decision state '{}'", literal)))
}

pub(crate) fn restore_cursor<T: SentinelRow>(
    sentinel: &T,
    registry: &ObjectRegistry,
) -> Result<Option<ObjectId>, FormatError> {
    match parse_cursor_key(sentinel.object())? {
        Some(id) if !registry.contains(id) => Err(FormatError::UnknownObject { id }),
        cursor => Ok(cursor),
    }
}

pub(crate) fn collect_notes<T: SentinelRow>(rows: &[T], note: impl Fn(&T) -> &String) -> Vec<String> {
    rows.iter()
        .map(|row| {
            if !row.object().trim().is_empty() {
                log::warn!(
                    "Ignoring object '{}' on a note row after the cursor",
                    row.object()
                );
            }
            note(row).clone()
        })
        .collect()
}
