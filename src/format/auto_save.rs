//! Unsaved-change tracking for review ledgers.
//!
//! Every recorded decision marks the ledger dirty. A save is due once the
//! reviewer has paused for the debounce delay and the minimum interval since
//! the previous save has elapsed.

use std::time::{Duration, Instant};

use crate::config::AutoSaveSettings;

/// Tracks ledger changes and auto-save timing.
#[derive(Debug)]
pub struct AutoSaveManager {
    /// Minimum interval between saves.
    save_interval: Duration,

    /// Quiet time required after the last change.
    debounce_delay: Duration,

    /// Time of last successful save.
    last_save: Option<Instant>,

    /// Time of the most recent unsaved change.
    last_change: Option<Instant>,

    /// Number of changes since the last save.
    pending_changes: usize,

    /// Whether saves are triggered automatically.
    enabled: bool,
}

impl AutoSaveManager {
    /// Default minimum interval between saves.
    pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);

    /// Default debounce delay.
    pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_secs(5);

    /// Create a manager with default timing.
    pub fn new() -> Self {
        Self {
            save_interval: Self::DEFAULT_SAVE_INTERVAL,
            debounce_delay: Self::DEFAULT_DEBOUNCE_DELAY,
            last_save: None,
            last_change: None,
            pending_changes: 0,
            enabled: true,
        }
    }

    /// Create a manager from configured timing.
    pub fn from_settings(settings: &AutoSaveSettings) -> Self {
        let mut manager = Self::new()
            .with_save_interval(Duration::from_secs(settings.interval_secs))
            .with_debounce_delay(Duration::from_secs(settings.debounce_secs));
        manager.enabled = settings.enabled;
        manager
    }

    /// Set the minimum interval between saves.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the debounce delay.
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Record a change to the ledger.
    pub fn mark_dirty(&mut self) {
        self.pending_changes += 1;
        self.last_change = Some(Instant::now());
        log::trace!("Ledger changed ({} unsaved)", self.pending_changes);
    }

    /// Whether the ledger has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.pending_changes > 0
    }

    /// Number of changes since the last save.
    pub fn pending_changes(&self) -> usize {
        self.pending_changes
    }

    /// Whether an automatic save is due now.
    pub fn should_save(&self) -> bool {
        if !self.enabled || !self.is_dirty() {
            return false;
        }
        let Some(last_change) = self.last_change else {
            return false;
        };
        if last_change.elapsed() < self.debounce_delay {
            return false;
        }
        self.last_save
            .is_none_or(|last_save| last_save.elapsed() >= self.save_interval)
    }

    /// Record a successful save.
    pub fn mark_saved(&mut self) {
        self.last_save = Some(Instant::now());
        self.last_change = None;
        self.pending_changes = 0;
        log::trace!("Ledger saved");
    }

    /// Record a failed save. Changes stay pending; the next attempt waits a
    /// full interval.
    pub fn mark_save_failed(&mut self) {
        self.last_save = Some(Instant::now());
        log::trace!("Ledger save failed, {} changes pending", self.pending_changes);
    }

    /// Forget all changes, e.g. after a ledger was loaded from disk.
    pub fn reset(&mut self) {
        self.last_save = None;
        self.last_change = None;
        self.pending_changes = 0;
    }
}

impl Default for AutoSaveManager {
    fn default() -> Self {
        Self::new()
    }
}
