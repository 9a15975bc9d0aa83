//! Second review pass over a random sample of objects.
//!
//! A double check audits the primary review: a fixed share of the objects is
//! drawn without replacement and reviewed again. The first-pass decision is
//! shown for context but never modified.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{CURRENT_INDEX_STATE, DEFAULT_DOUBLE_CHECK_PERCENTAGE};
use crate::format::{DoubleCheckRow, FormatError, cursor_key, label_key, split_at_sentinel};
use crate::model::{DecisionState, ObjectId, ObjectRegistry};

use super::ledger::{
    AnnotationLedger, checked_fraction, collect_notes, known_object, parse_state, progress_label,
    restore_cursor,
};
use super::navigation::{Navigation, NavigationCursor};

/// Draws the objects for a double-check pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleCheckSampler {
    percentage: f64,
}

impl Default for DoubleCheckSampler {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_CHECK_PERCENTAGE)
    }
}

impl DoubleCheckSampler {
    /// Sampler selecting `percentage` percent of the objects.
    pub fn new(percentage: f64) -> Self {
        Self {
            percentage: percentage.clamp(0.0, 100.0),
        }
    }

    /// Share of objects sampled, in percent.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Number of ids drawn from `total`: at least one, at most `total`.
    pub fn sample_size(&self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let wanted = (self.percentage / 100.0 * total as f64).round() as usize;
        wanted.clamp(1, total)
    }

    /// Draw ids uniformly without replacement, in draw order.
    pub fn sample<R: Rng + ?Sized>(&self, ids: &[ObjectId], rng: &mut R) -> Vec<ObjectId> {
        let amount = self.sample_size(ids.len());
        let picked: Vec<ObjectId> = rand::seq::index::sample(rng, ids.len(), amount)
            .into_iter()
            .map(|i| ids[i])
            .collect();
        log::info!(
            "Sampled {} of {} objects for double check",
            picked.len(),
            ids.len()
        );
        picked
    }

    /// Reproducible draw.
    pub fn sample_seeded(&self, ids: &[ObjectId], seed: u64) -> Vec<ObjectId> {
        self.sample(ids, &mut StdRng::seed_from_u64(seed))
    }

    /// Draw seeded from OS entropy; every call inspects different objects.
    pub fn sample_unseeded(&self, ids: &[ObjectId]) -> Vec<ObjectId> {
        self.sample(ids, &mut StdRng::from_os_rng())
    }
}

/// One sampled object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleCheckEntry {
    pub id: ObjectId,
    /// Decision from the primary pass, read-only here
    pub first_pass: DecisionState,
    /// Decision from the double check
    pub second_pass: DecisionState,
    pub note: String,
}

/// Two-pass ledger of a double check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoubleCheckLedger {
    entries: Vec<DoubleCheckEntry>,
    non_object_notes: Vec<String>,
    cursor: Option<ObjectId>,
}

impl DoubleCheckLedger {
    /// Ledger for `sample`, carrying first-pass states from `primary`.
    pub fn for_sample(sample: &[ObjectId], primary: &AnnotationLedger) -> Self {
        let entries = sample
            .iter()
            .map(|&id| DoubleCheckEntry {
                id,
                first_pass: primary.state_of(id),
                second_pass: DecisionState::Unset,
                note: String::new(),
            })
            .collect();
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Sampled objects in review order.
    pub fn entries(&self) -> &[DoubleCheckEntry] {
        &self.entries
    }

    /// Entry for `id`, if sampled.
    pub fn entry(&self, id: ObjectId) -> Option<&DoubleCheckEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Record the second-pass decision. Returns `false` if `id` was not
    /// sampled.
    pub fn record_second_pass(
        &mut self,
        id: ObjectId,
        state: DecisionState,
        note: impl Into<String>,
    ) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.second_pass = state;
        entry.note = note.into();
        true
    }

    /// Append a note that is not tied to an object.
    pub fn record_non_object_note(&mut self, note: impl Into<String>) {
        self.non_object_notes.push(note.into());
    }

    /// Free-standing notes.
    pub fn non_object_notes(&self) -> &[String] {
        &self.non_object_notes
    }

    /// Move the resume cursor.
    pub fn set_cursor(&mut self, cursor: Option<ObjectId>) {
        self.cursor = cursor;
    }

    /// Object the reviewer was last looking at.
    pub fn cursor(&self) -> Option<ObjectId> {
        self.cursor
    }

    /// Number of sampled objects with a second-pass decision.
    pub fn checked_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.second_pass.is_decided())
            .count()
    }

    /// Share of the sample that has been double-checked.
    pub fn checked_fraction(&self) -> f64 {
        checked_fraction(self.checked_count(), self.entries.len())
    }

    /// Progress text such as `"40.00% Checked"`.
    pub fn progress_label(&self) -> String {
        progress_label(self.checked_fraction())
    }

    /// List-item marker color, from the second-pass decision.
    pub fn marker_for(&self, id: ObjectId) -> Option<[u8; 3]> {
        self.entry(id).and_then(|e| e.second_pass.marker_color())
    }

    /// Rows in file order: sampled objects, the cursor sentinel, then notes.
    pub fn serialize(&self) -> Vec<DoubleCheckRow> {
        let mut rows = Vec::with_capacity(self.entries.len() + 1 + self.non_object_notes.len());
        rows.extend(self.entries.iter().map(|e| DoubleCheckRow {
            object: label_key(e.id),
            first_state: e.first_pass.as_str().to_string(),
            second_state: e.second_pass.as_str().to_string(),
            note: e.note.clone(),
        }));
        rows.push(DoubleCheckRow {
            object: cursor_key(self.cursor),
            first_state: CURRENT_INDEX_STATE.to_string(),
            ..DoubleCheckRow::default()
        });
        rows.extend(self.non_object_notes.iter().map(DoubleCheckRow::note));
        rows
    }

    /// Rebuild a double-check ledger from rows.
    pub fn deserialize(
        rows: &[DoubleCheckRow],
        registry: &ObjectRegistry,
    ) -> Result<Self, FormatError> {
        let (objects, sentinel, notes) = split_at_sentinel(rows)?;

        let mut entries: Vec<DoubleCheckEntry> = Vec::with_capacity(objects.len());
        for row in objects {
            let id = known_object(&row.object, registry)?;
            if entries.iter().any(|e| e.id == id) {
                return Err(FormatError::malformed(format!(
                    "object {} sampled twice",
                    id
                )));
            }
            entries.push(DoubleCheckEntry {
                id,
                first_pass: parse_state(&row.first_state)?,
                second_pass: parse_state(&row.second_state)?,
                note: row.note.clone(),
            });
        }

        let cursor = restore_cursor(sentinel, registry)?;
        if let Some(id) = cursor
            && !entries.iter().any(|e| e.id == id)
        {
            return Err(FormatError::malformed(format!(
                "cursor object {} is not part of the sample",
                id
            )));
        }

        Ok(Self {
            entries,
            non_object_notes: collect_notes(notes, |row| &row.note),
            cursor,
        })
    }
}

/// An active double-check pass: its sample order, cursor and ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleCheckSession {
    cursor: NavigationCursor,
    ledger: DoubleCheckLedger,
}

impl DoubleCheckSession {
    /// Start a pass over `sample`, snapshotting first-pass states.
    pub fn start(sample: Vec<ObjectId>, primary: &AnnotationLedger) -> Self {
        let ledger = DoubleCheckLedger::for_sample(&sample, primary);
        Self {
            cursor: NavigationCursor::new(sample),
            ledger,
        }
    }

    /// Resume a pass from a saved ledger.
    pub fn resume(ledger: DoubleCheckLedger) -> Self {
        let mut cursor = NavigationCursor::new(ledger.entries().iter().map(|e| e.id).collect());
        if let Some(id) = ledger.cursor() {
            cursor.navigate(Navigation::JumpTo(id));
        }
        Self { cursor, ledger }
    }

    /// Sampled ids in review order.
    pub fn sample(&self) -> &[ObjectId] {
        self.cursor.order()
    }

    /// Whether `id` belongs to the sample.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.ledger.entry(id).is_some()
    }

    /// Navigation state of the pass.
    pub fn cursor(&self) -> &NavigationCursor {
        &self.cursor
    }

    /// Current object of the pass.
    pub fn current(&self) -> Option<ObjectId> {
        self.cursor.current()
    }

    /// Move within the sample.
    pub fn navigate(&mut self, step: Navigation) -> Option<ObjectId> {
        let current = self.cursor.navigate(step)?;
        self.ledger.set_cursor(Some(current));
        Some(current)
    }

    /// Record the second-pass decision for a sampled object.
    pub fn record_decision(
        &mut self,
        id: ObjectId,
        state: DecisionState,
        note: impl Into<String>,
    ) -> bool {
        self.ledger.record_second_pass(id, state, note)
    }

    /// The two-pass ledger.
    pub fn ledger(&self) -> &DoubleCheckLedger {
        &self.ledger
    }

    /// Mutable access for free-standing notes.
    pub fn ledger_mut(&mut self) -> &mut DoubleCheckLedger {
        &mut self.ledger
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::data::LabelMask;

    #[test]
    fn test_five_percent_of_hundred() {
        let ids: Vec<ObjectId> = (1..=100).collect();
        let picked = DoubleCheckSampler::new(5.0).sample_seeded(&ids, 7);

        assert_eq!(picked.len(), 5);
        let unique: HashSet<ObjectId> = picked.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert!(picked.iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn test_sample_size_bounds() {
        let sampler = DoubleCheckSampler::default();
        assert_eq!(sampler.sample_size(0), 0);
        assert_eq!(sampler.sample_size(3), 1);
        assert_eq!(sampler.sample_size(30), 2);
        assert_eq!(DoubleCheckSampler::new(100.0).sample_size(4), 4);
        assert_eq!(DoubleCheckSampler::new(0.0).sample_size(4), 1);
    }

    #[test]
    fn test_seeded_sample_is_reproducible() {
        let ids: Vec<ObjectId> = (1..=50).collect();
        let sampler = DoubleCheckSampler::new(20.0);
        assert_eq!(sampler.sample_seeded(&ids, 3), sampler.sample_seeded(&ids, 3));
    }

    #[test]
    fn test_unseeded_sample_has_right_size() {
        let ids: Vec<ObjectId> = (1..=40).collect();
        let picked = DoubleCheckSampler::new(10.0).sample_unseeded(&ids);
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_session_keeps_first_pass_read_only() {
        let mut primary = AnnotationLedger::new();
        primary.record_decision(2, DecisionState::Yes, "");
        primary.record_decision(5, DecisionState::No, "");

        let mut session = DoubleCheckSession::start(vec![5, 2, 9], &primary);
        assert_eq!(session.navigate(Navigation::Next), Some(5));
        assert!(session.record_decision(5, DecisionState::Yes, "actually fine"));
        assert!(!session.record_decision(1, DecisionState::Yes, ""));

        let entry = session.ledger().entry(5).unwrap();
        assert_eq!(entry.first_pass, DecisionState::No);
        assert_eq!(entry.second_pass, DecisionState::Yes);
        assert_eq!(session.ledger().entry(9).unwrap().first_pass, DecisionState::Unset);
        assert_eq!(primary.state_of(5), DecisionState::No);
        assert_eq!(session.ledger().progress_label(), "33.33% Checked");
    }

    #[test]
    fn test_ledger_round_trip_and_resume() {
        let mask = LabelMask::from_rows(&[[2, 5, 9, 0]]).unwrap();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let mut session = DoubleCheckSession::start(vec![9, 2], &AnnotationLedger::new());
        session.navigate(Navigation::JumpTo(2));
        session.record_decision(2, DecisionState::No, "two nuclei");
        session.ledger_mut().record_non_object_note("blurry corner");

        let rows = session.ledger().serialize();
        assert_eq!(rows[2].object, "label_2");
        assert_eq!(rows[2].first_state, "Current index");
        assert_eq!(rows[2].second_state, "");

        let restored = DoubleCheckLedger::deserialize(&rows, &registry).unwrap();
        assert_eq!(&restored, session.ledger());
        assert_eq!(restored.serialize(), rows);

        let resumed = DoubleCheckSession::resume(restored);
        assert_eq!(resumed.sample(), &[9, 2]);
        assert_eq!(resumed.current(), Some(2));
    }

    #[test]
    fn test_cursor_outside_sample_is_malformed() {
        let mask = LabelMask::from_rows(&[[2, 5]]).unwrap();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        let rows = vec![
            DoubleCheckRow {
                object: "label_2".to_string(),
                ..DoubleCheckRow::default()
            },
            DoubleCheckRow {
                object: "label_5".to_string(),
                first_state: "Current index".to_string(),
                ..DoubleCheckRow::default()
            },
        ];
        assert!(matches!(
            DoubleCheckLedger::deserialize(&rows, &registry),
            Err(FormatError::MalformedLedger { .. })
        ));
    }
}
