//! Review session: one mask, its overlays, and the reviewer's progress.
//!
//! The session is the boundary used by a display layer. It answers hit
//! tests and bounding-box queries, keeps the overlay slots up to date while
//! the reviewer navigates and hovers, and records decisions into the active
//! ledger (primary or double check).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::analysis::{ConnectivityReport, RegionConnectivityAnalyzer};
use crate::config::ReviewConfig;
use crate::constants::DOUBLE_CHECK_SUFFIX;
use crate::data::{LabelMask, LoaderError, MaskLoaderRegistry};
use crate::format::{self, AutoSaveManager, DoubleCheckRow, FormatError, LedgerRow};
use crate::model::{BoundingBox, DecisionState, ObjectId, ObjectRegistry, RegistryError};
use crate::overlay::{
    OverlayCompositor, OverlayError, OverlayEvent, OverlayJob, OverlayRaster, OverlayWorker,
};

use super::double_check::{DoubleCheckLedger, DoubleCheckSampler, DoubleCheckSession};
use super::ledger::AnnotationLedger;
use super::navigation::{Navigation, NavigationCursor};

/// Errors surfaced by [`ReviewSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The mask file could not be read or decoded.
    #[error("Failed to load mask: {0}")]
    Mask(#[from] LoaderError),

    /// An overlay could not be built or exported.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// A ledger file could not be read, written or applied.
    #[error("Ledger {path:?}: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    /// The object is not part of the mask or of the active pass.
    #[error("Unknown object {id}")]
    UnknownObject { id: ObjectId },

    /// No object is selected.
    #[error("No object selected")]
    NoCurrentObject,

    /// No double check is running.
    #[error("No double check in progress")]
    NoDoubleCheck,

    /// The ledger file was written for a different mask.
    #[error("Ledger '{ledger}' does not belong to mask '{mask}'")]
    NameMismatch { mask: String, ledger: String },
}

/// Overlay slots of a session.
///
/// `overview` is present once the background build has finished,
/// `isolated` after the first navigation step, `highlight` while an object
/// is hovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayLayers {
    pub overview: Option<OverlayRaster>,
    pub isolated: Option<OverlayRaster>,
    pub highlight: Option<OverlayRaster>,
}

impl OverlayLayers {
    /// Raster to display: highlight, else isolated, else overview.
    pub fn current(&self) -> Option<&OverlayRaster> {
        self.highlight
            .as_ref()
            .or(self.isolated.as_ref())
            .or(self.overview.as_ref())
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Item of the object list shown next to the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectListItem {
    pub id: ObjectId,
    pub label: String,
    pub marker: Option<[u8; 3]>,
}

/// State of one review of one mask.
pub struct ReviewSession {
    mask: Arc<LabelMask>,
    registry: Arc<ObjectRegistry>,
    mask_name: Option<String>,
    compositor: OverlayCompositor,
    analyzer: RegionConnectivityAnalyzer,
    sampler: DoubleCheckSampler,
    sample_seed: Option<u64>,
    worker: OverlayWorker,
    overview_progress: Option<u8>,
    connectivity: Option<ConnectivityReport>,
    cursor: NavigationCursor,
    layers: OverlayLayers,
    hovered: Option<ObjectId>,
    mask_visible: bool,
    ledger: AnnotationLedger,
    double_check: Option<DoubleCheckSession>,
    autosave: AutoSaveManager,
}

impl std::fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSession")
            .field("mask_name", &self.mask_name)
            .field("objects", &self.registry.len())
            .field("current", &self.current_object())
            .field("double_check", &self.double_check.is_some())
            .finish_non_exhaustive()
    }
}

impl ReviewSession {
    /// Start a session for `mask` and queue its overview build.
    pub fn new(mask: LabelMask, config: &ReviewConfig) -> Result<Self, SessionError> {
        let mut session = Self {
            mask: Arc::new(LabelMask::default()),
            registry: Arc::new(ObjectRegistry::empty()),
            mask_name: None,
            compositor: OverlayCompositor::new(config.overlay.low_alpha)
                .with_highlight_alpha(config.overlay.highlight_alpha),
            analyzer: RegionConnectivityAnalyzer::new(config.analysis.dead_pixel_threshold),
            sampler: DoubleCheckSampler::new(config.double_check.percentage),
            sample_seed: config.double_check.seed,
            worker: OverlayWorker::spawn()?,
            overview_progress: None,
            connectivity: None,
            cursor: NavigationCursor::default(),
            layers: OverlayLayers::default(),
            hovered: None,
            mask_visible: true,
            ledger: AnnotationLedger::new(),
            double_check: None,
            autosave: AutoSaveManager::from_settings(&config.autosave),
        };
        session.load_mask(mask, None)?;
        Ok(session)
    }

    /// Start a session for the mask file at `path`.
    pub fn open(path: &Path, config: &ReviewConfig) -> Result<Self, SessionError> {
        let mask = MaskLoaderRegistry::new().load_path(path)?;
        let mut session = Self::new(mask, config)?;
        session.mask_name = name_stem(path);
        Ok(session)
    }

    /// Replace the mask, discarding all review state of the previous one.
    ///
    /// Any overview build still running for the old mask is abandoned and
    /// its output is never applied.
    pub fn load_mask(&mut self, mask: LabelMask, source: Option<&Path>) -> Result<(), SessionError> {
        let registry = match ObjectRegistry::from_mask(&mask) {
            Ok(registry) => registry,
            Err(RegistryError::EmptyMask) => {
                log::info!("Mask has no objects");
                ObjectRegistry::empty()
            }
        };
        log::info!(
            "Loaded {}x{} mask with {} objects",
            mask.width(),
            mask.height(),
            registry.len()
        );

        self.mask = Arc::new(mask);
        self.registry = Arc::new(registry);
        if let Some(path) = source {
            self.mask_name = name_stem(path);
        }
        self.cursor = NavigationCursor::new(self.registry.ids().collect());
        self.layers.clear();
        self.hovered = None;
        self.overview_progress = None;
        self.connectivity = None;
        self.ledger = AnnotationLedger::new();
        self.double_check = None;
        self.autosave.reset();

        let generation = self.worker.next_generation();
        self.worker.submit(OverlayJob::BuildOverview {
            generation,
            mask: Arc::clone(&self.mask),
            registry: Arc::clone(&self.registry),
            compositor: self.compositor,
        })?;
        Ok(())
    }

    /// The loaded mask.
    pub fn mask(&self) -> &LabelMask {
        &self.mask
    }

    /// Objects of the loaded mask.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    // --- Background work ---

    /// Apply every event the worker has produced so far.
    pub fn poll_worker(&mut self) -> Result<(), SessionError> {
        while let Some(event) = self.worker.try_next_event() {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn apply_event(&mut self, event: OverlayEvent) -> Result<(), SessionError> {
        if !self.worker.is_current(event.generation()) {
            log::debug!("Discarding stale overlay event {:?}", event.generation());
            return Ok(());
        }
        match event {
            OverlayEvent::Progress { percent, .. } => {
                self.overview_progress = Some(percent);
            }
            OverlayEvent::OverviewReady { raster, .. } => {
                log::info!("Overview ready");
                self.overview_progress = Some(100);
                self.layers.overview = Some(raster);
            }
            OverlayEvent::ConnectivityReady { report, .. } => {
                log::info!("Connectivity analysis flagged {} objects", report.len());
                self.connectivity = Some(report);
            }
            OverlayEvent::Failed { error, .. } => return Err(error.into()),
            OverlayEvent::Cancelled { generation } => {
                log::debug!("Overlay job {} cancelled", generation);
            }
        }
        Ok(())
    }

    fn wait_until(
        &mut self,
        timeout: Duration,
        done: impl Fn(&Self) -> bool,
    ) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        while !done(self) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            match self.worker.wait_event(remaining)? {
                Some(event) => self.apply_event(event)?,
                None => return Ok(done(self)),
            }
        }
        Ok(true)
    }

    /// Block until the overview is available. Returns `false` on timeout.
    pub fn wait_for_overview(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        self.wait_until(timeout, |s| s.layers.overview.is_some())
    }

    /// Latest overview build progress in percent.
    pub fn overview_progress(&self) -> Option<u8> {
        self.overview_progress
    }

    /// Queue connectivity analysis of the current mask.
    pub fn request_connectivity(&mut self) -> Result<(), SessionError> {
        self.worker.submit(OverlayJob::AnalyzeConnectivity {
            generation: self.worker.current_generation(),
            mask: Arc::clone(&self.mask),
            analyzer: self.analyzer,
        })?;
        Ok(())
    }

    /// Block until the connectivity report is available.
    pub fn wait_for_connectivity(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        self.wait_until(timeout, |s| s.connectivity.is_some())
    }

    /// Report of the last finished analysis.
    pub fn connectivity(&self) -> Option<&ConnectivityReport> {
        self.connectivity.as_ref()
    }

    /// Pre-flag defective objects as "No" in the primary ledger.
    pub fn flag_defects(&mut self) -> usize {
        let Some(report) = &self.connectivity else {
            return 0;
        };
        let flagged = report.flag_into(&mut self.ledger);
        if flagged > 0 {
            self.autosave.mark_dirty();
        }
        flagged
    }

    // --- Display queries ---

    /// Object under `(row, col)`; `None` for background or outside the mask.
    pub fn object_at(&self, row: i64, col: i64) -> Option<ObjectId> {
        self.mask.object_at(row, col)
    }

    /// Bounding box of `id`, for zooming to an object.
    pub fn bounding_box_of(&self, id: ObjectId) -> Option<BoundingBox> {
        self.registry.bounding_box_of(id)
    }

    /// Raster to display, if any is available yet.
    pub fn current_overlay(&self) -> Option<&OverlayRaster> {
        if !self.mask_visible {
            return None;
        }
        self.layers.current()
    }

    /// All overlay slots.
    pub fn layers(&self) -> &OverlayLayers {
        &self.layers
    }

    /// Show or hide the mask. Hiding drops the hover highlight.
    pub fn toggle_mask_visible(&mut self) -> bool {
        self.mask_visible = !self.mask_visible;
        if !self.mask_visible {
            self.clear_highlight();
        }
        self.mask_visible
    }

    /// Whether the mask is shown.
    pub fn is_mask_visible(&self) -> bool {
        self.mask_visible
    }

    /// Pointer moved to `(row, col)`.
    ///
    /// Raises the object under the pointer to full alpha on top of the
    /// overview. Background, positions outside the mask and a hidden mask
    /// clear the highlight.
    pub fn hover_at(&mut self, row: i64, col: i64) -> Option<ObjectId> {
        let target = if self.mask_visible {
            self.object_at(row, col)
        } else {
            None
        };
        let Some(id) = target else {
            self.clear_highlight();
            return None;
        };
        if self.hovered == Some(id) {
            return Some(id);
        }

        let (Some(overview), Some(record)) = (&self.layers.overview, self.registry.get(id)) else {
            return Some(id);
        };
        log::trace!("Highlighting object {}", id);
        self.layers.highlight = Some(self.compositor.build_highlight(overview, &self.mask, record));
        self.hovered = Some(id);
        Some(id)
    }

    fn clear_highlight(&mut self) {
        self.layers.highlight = None;
        self.hovered = None;
    }

    // --- Navigation ---

    fn active_cursor(&self) -> &NavigationCursor {
        match &self.double_check {
            Some(dc) => dc.cursor(),
            None => &self.cursor,
        }
    }

    /// Object currently under review.
    pub fn current_object(&self) -> Option<ObjectId> {
        self.active_cursor().current()
    }

    /// Move through the active pass and rebuild the isolated overlay.
    ///
    /// Returns `Ok(None)` when there is nothing to navigate.
    pub fn navigate(&mut self, step: Navigation) -> Result<Option<ObjectId>, SessionError> {
        if self.active_cursor().is_empty() {
            return Ok(None);
        }
        let moved = match &mut self.double_check {
            Some(dc) => dc.navigate(step),
            None => self.cursor.navigate(step),
        };
        let Some(id) = moved else {
            return match step {
                Navigation::JumpTo(id) => Err(SessionError::UnknownObject { id }),
                _ => Ok(None),
            };
        };
        if self.double_check.is_none() {
            self.ledger.set_cursor(Some(id));
        }

        let record = self
            .registry
            .get(id)
            .ok_or(SessionError::UnknownObject { id })?;
        self.layers.isolated = Some(self.compositor.build_isolated(&self.mask, record)?);
        self.clear_highlight();
        log::debug!("Navigated to object {}", id);
        Ok(Some(id))
    }

    // --- Decisions ---

    /// Record a decision for `id` in the active ledger.
    pub fn record_decision(
        &mut self,
        id: ObjectId,
        state: DecisionState,
        note: impl Into<String>,
    ) -> Result<(), SessionError> {
        if !self.registry.contains(id) {
            return Err(SessionError::UnknownObject { id });
        }
        match &mut self.double_check {
            Some(dc) => {
                if !dc.record_decision(id, state, note) {
                    return Err(SessionError::UnknownObject { id });
                }
            }
            None => self.ledger.record_decision(id, state, note),
        }
        self.autosave.mark_dirty();
        Ok(())
    }

    /// Accept the current object.
    pub fn mark_yes(&mut self) -> Result<ObjectId, SessionError> {
        let id = self.current_object().ok_or(SessionError::NoCurrentObject)?;
        self.record_decision(id, DecisionState::Yes, "")?;
        Ok(id)
    }

    /// Reject the current object with a reason.
    pub fn mark_no(&mut self, note: impl Into<String>) -> Result<ObjectId, SessionError> {
        let id = self.current_object().ok_or(SessionError::NoCurrentObject)?;
        self.record_decision(id, DecisionState::No, note)?;
        Ok(id)
    }

    /// Note a problem that is not tied to an object.
    pub fn note_non_object(&mut self, note: impl Into<String>) {
        match &mut self.double_check {
            Some(dc) => dc.ledger_mut().record_non_object_note(note),
            None => self.ledger.record_non_object_note(note),
        }
        self.autosave.mark_dirty();
    }

    /// Primary ledger.
    pub fn ledger(&self) -> &AnnotationLedger {
        &self.ledger
    }

    /// Progress text of the active pass.
    pub fn progress_label(&self) -> String {
        match &self.double_check {
            Some(dc) => dc.ledger().progress_label(),
            None => self.ledger.progress_label(self.registry.len()),
        }
    }

    /// Object list of the active pass, with decision markers.
    pub fn object_list(&self) -> Vec<ObjectListItem> {
        self.active_cursor()
            .order()
            .iter()
            .filter_map(|&id| self.registry.get(id))
            .map(|record| ObjectListItem {
                id: record.id,
                label: record.list_label(),
                marker: match &self.double_check {
                    Some(dc) => dc.ledger().marker_for(record.id),
                    None => self.ledger.marker_for(record.id),
                },
            })
            .collect()
    }

    // --- Double check ---

    /// Sample objects and switch to a double-check pass.
    pub fn start_double_check(&mut self) -> &DoubleCheckSession {
        let ids: Vec<ObjectId> = self.registry.ids().collect();
        let sample = match self.sample_seed {
            Some(seed) => self.sampler.sample_seeded(&ids, seed),
            None => self.sampler.sample_unseeded(&ids),
        };
        self.enter_double_check(DoubleCheckSession::start(sample, &self.ledger))
    }

    fn enter_double_check(&mut self, session: DoubleCheckSession) -> &DoubleCheckSession {
        self.layers.isolated = None;
        self.clear_highlight();
        self.double_check.insert(session)
    }

    /// Leave the double-check pass and return it.
    pub fn end_double_check(&mut self) -> Option<DoubleCheckSession> {
        let session = self.double_check.take()?;
        self.layers.isolated = None;
        self.clear_highlight();
        Some(session)
    }

    /// Running double-check pass.
    pub fn double_check(&self) -> Option<&DoubleCheckSession> {
        self.double_check.as_ref()
    }

    // --- Persistence ---

    /// Suggested primary ledger file name, `<mask stem>.csv`.
    pub fn suggested_ledger_name(&self) -> Option<String> {
        self.mask_name.as_ref().map(|stem| format!("{}.csv", stem))
    }

    /// Suggested double-check ledger file name.
    pub fn suggested_double_check_name(&self) -> Option<String> {
        self.mask_name
            .as_ref()
            .map(|stem| format!("{}{}.csv", stem, DOUBLE_CHECK_SUFFIX))
    }

    fn check_pairing(&self, path: &Path, suffix: Option<&str>) -> Result<(), SessionError> {
        let (Some(mask), Some(ledger)) = (&self.mask_name, name_stem(path)) else {
            return Ok(());
        };
        let matches = ledger == *mask
            || suffix.is_some_and(|s| ledger.strip_suffix(s) == Some(mask.as_str()));
        if matches {
            Ok(())
        } else {
            Err(SessionError::NameMismatch {
                mask: mask.clone(),
                ledger,
            })
        }
    }

    /// Whether decisions were made since the last save or load.
    pub fn has_unsaved_changes(&self) -> bool {
        self.autosave.is_dirty()
    }

    /// Whether an automatic save is due.
    pub fn should_auto_save(&self) -> bool {
        self.autosave.should_save()
    }

    /// Write the primary ledger to `path`.
    pub fn save_ledger(&mut self, path: &Path) -> Result<(), SessionError> {
        let rows = self.ledger.serialize();
        self.save_rows(path, &rows)
    }

    /// Write the double-check ledger to `path`.
    pub fn save_double_check(&mut self, path: &Path) -> Result<(), SessionError> {
        let rows = self
            .double_check
            .as_ref()
            .ok_or(SessionError::NoDoubleCheck)?
            .ledger()
            .serialize();
        self.save_rows(path, &rows)
    }

    fn save_rows<T: serde::Serialize>(&mut self, path: &Path, rows: &[T]) -> Result<(), SessionError> {
        match format::save_rows(path, rows) {
            Ok(()) => {
                self.autosave.mark_saved();
                Ok(())
            }
            Err(source) => {
                self.autosave.mark_save_failed();
                Err(SessionError::Ledger {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Restore the primary ledger from `path` and jump to its cursor.
    ///
    /// On error the session is left unchanged.
    pub fn load_ledger(&mut self, path: &Path) -> Result<(), SessionError> {
        self.check_pairing(path, None)?;
        let ledger = format::load_rows::<LedgerRow>(path)
            .and_then(|rows| AnnotationLedger::deserialize(&rows, &self.registry))
            .map_err(|source| SessionError::Ledger {
                path: path.to_path_buf(),
                source,
            })?;
        let cursor = ledger.cursor();

        self.ledger = ledger;
        self.double_check = None;
        self.cursor = NavigationCursor::new(self.registry.ids().collect());
        self.layers.isolated = None;
        self.clear_highlight();
        self.autosave.reset();
        log::info!("Loaded ledger from {:?}", path);

        if let Some(id) = cursor {
            self.navigate(Navigation::JumpTo(id))?;
        }
        Ok(())
    }

    /// Resume a double-check pass saved at `path`.
    pub fn load_double_check(&mut self, path: &Path) -> Result<(), SessionError> {
        self.check_pairing(path, Some(DOUBLE_CHECK_SUFFIX))?;
        let ledger = format::load_rows::<DoubleCheckRow>(path)
            .and_then(|rows| DoubleCheckLedger::deserialize(&rows, &self.registry))
            .map_err(|source| SessionError::Ledger {
                path: path.to_path_buf(),
                source,
            })?;

        self.enter_double_check(DoubleCheckSession::resume(ledger));
        self.autosave.reset();
        if let Some(id) = self.current_object() {
            let record = self
                .registry
                .get(id)
                .ok_or(SessionError::UnknownObject { id })?;
            self.layers.isolated = Some(self.compositor.build_isolated(&self.mask, record)?);
        }
        log::info!("Resumed double check from {:?}", path);
        Ok(())
    }
}

/// File name up to its first dot, e.g. `cells` for `cells.ome.tif`.
fn name_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next().unwrap_or(name);
    (!stem.is_empty()).then(|| stem.to_string())
}
