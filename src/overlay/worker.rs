//! Background thread for overview builds and connectivity analysis.
//!
//! The worker receives [`OverlayJob`]s over a channel and answers with
//! [`OverlayEvent`]s on a second channel. Every job carries a generation
//! number; the worker abandons a job as soon as a newer generation has been
//! issued, so a superseded mask load never produces output.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::analysis::{ConnectivityReport, RegionConnectivityAnalyzer};
use crate::data::LabelMask;
use crate::model::ObjectRegistry;

use super::{OverlayCompositor, OverlayError, OverlayRaster};

/// Work item for the overlay thread.
#[derive(Debug)]
pub enum OverlayJob {
    /// Build the low-alpha overview of every object.
    BuildOverview {
        generation: u64,
        mask: Arc<LabelMask>,
        registry: Arc<ObjectRegistry>,
        compositor: OverlayCompositor,
    },
    /// Run connected-component analysis over the mask.
    AnalyzeConnectivity {
        generation: u64,
        mask: Arc<LabelMask>,
        analyzer: RegionConnectivityAnalyzer,
    },
}

impl OverlayJob {
    /// Generation the job was submitted under.
    pub fn generation(&self) -> u64 {
        match self {
            OverlayJob::BuildOverview { generation, .. }
            | OverlayJob::AnalyzeConnectivity { generation, .. } => *generation,
        }
    }
}

/// Notification sent back from the overlay thread.
///
/// For one job, `Progress` events arrive in strictly increasing order and
/// are followed by exactly one terminal event.
#[derive(Debug)]
pub enum OverlayEvent {
    /// Integer percentage of the overview build.
    Progress { generation: u64, percent: u8 },
    /// Finished overview raster.
    OverviewReady {
        generation: u64,
        raster: OverlayRaster,
    },
    /// Finished connectivity report.
    ConnectivityReady {
        generation: u64,
        report: ConnectivityReport,
    },
    /// The job failed (allocation failure or panic).
    Failed {
        generation: u64,
        error: OverlayError,
    },
    /// The job was superseded before it finished.
    Cancelled { generation: u64 },
}

impl OverlayEvent {
    /// Generation of the job that produced this event.
    pub fn generation(&self) -> u64 {
        match self {
            OverlayEvent::Progress { generation, .. }
            | OverlayEvent::OverviewReady { generation, .. }
            | OverlayEvent::ConnectivityReady { generation, .. }
            | OverlayEvent::Failed { generation, .. }
            | OverlayEvent::Cancelled { generation } => *generation,
        }
    }

    /// Whether this is the last event of its job.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OverlayEvent::Progress { .. })
    }
}

/// Message sent to the worker thread.
enum ThreadMessage {
    /// Run a job
    Run(OverlayJob),
    /// Shutdown the thread
    Shutdown,
}

/// Owner of the overlay thread.
///
/// Dropping the worker shuts the thread down and joins it.
pub struct OverlayWorker {
    request_tx: Sender<ThreadMessage>,
    event_rx: Receiver<OverlayEvent>,
    thread_handle: Option<JoinHandle<()>>,
    latest_generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for OverlayWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayWorker")
            .field("generation", &self.current_generation())
            .finish_non_exhaustive()
    }
}

impl OverlayWorker {
    /// Spawn the worker thread.
    pub fn spawn() -> Result<Self, OverlayError> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (event_tx, event_rx) = mpsc::channel::<OverlayEvent>();
        let latest_generation = Arc::new(AtomicU64::new(0));
        let latest = Arc::clone(&latest_generation);

        let thread_handle = thread::Builder::new()
            .name("overlay-worker".to_string())
            .spawn(move || {
                log::info!("Overlay worker thread started");
                Self::thread_loop(&request_rx, &event_tx, &latest);
                log::info!("Overlay worker thread exiting");
            })
            .map_err(|e| {
                OverlayError::WorkerUnavailable(format!("failed to spawn thread: {}", e))
            })?;

        Ok(Self {
            request_tx,
            event_rx,
            thread_handle: Some(thread_handle),
            latest_generation,
        })
    }

    /// Issue a new generation, invalidating every job of older generations.
    pub fn next_generation(&self) -> u64 {
        self.latest_generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Most recently issued generation.
    pub fn current_generation(&self) -> u64 {
        self.latest_generation.load(Ordering::Acquire)
    }

    /// Whether results of `generation` may still be applied.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current_generation()
    }

    /// Queue a job.
    pub fn submit(&self, job: OverlayJob) -> Result<(), OverlayError> {
        let generation = job.generation();
        self.request_tx
            .send(ThreadMessage::Run(job))
            .map_err(|_| OverlayError::WorkerUnavailable("request channel closed".to_string()))?;
        log::debug!("Submitted overlay job for generation {}", generation);
        Ok(())
    }

    /// Take one pending event without blocking.
    pub fn try_next_event(&self) -> Option<OverlayEvent> {
        match self.event_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Overlay worker disconnected");
                None
            }
        }
    }

    /// Wait up to `timeout` for the next event. `Ok(None)` means the
    /// timeout elapsed.
    pub fn wait_event(&self, timeout: Duration) -> Result<Option<OverlayEvent>, OverlayError> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(OverlayError::WorkerUnavailable(
                "event channel closed".to_string(),
            )),
        }
    }

    fn thread_loop(
        request_rx: &Receiver<ThreadMessage>,
        event_tx: &Sender<OverlayEvent>,
        latest: &AtomicU64,
    ) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Run(job)) => {
                    let generation = job.generation();
                    let event = Self::run_job(job, event_tx, latest);
                    if let OverlayEvent::Failed { error, .. } = &event {
                        log::error!("Overlay job {} failed: {}", generation, error);
                    }
                    if event_tx.send(event).is_err() {
                        log::warn!("Event channel closed, overlay worker exiting");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    break;
                }
                Err(_) => {
                    log::debug!("Request channel closed, overlay worker exiting");
                    break;
                }
            }
        }
    }

    /// Run one job to completion, returning its terminal event.
    fn run_job(job: OverlayJob, event_tx: &Sender<OverlayEvent>, latest: &AtomicU64) -> OverlayEvent {
        let generation = job.generation();
        let is_stale = || latest.load(Ordering::Acquire) != generation;

        if is_stale() {
            log::debug!("Skipping stale overlay job {}", generation);
            return OverlayEvent::Cancelled { generation };
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match job {
            OverlayJob::BuildOverview {
                mask,
                registry,
                compositor,
                ..
            } => {
                let progress = |percent: u8| {
                    // The receiver may already be gone; the terminal send reports that.
                    let _ = event_tx.send(OverlayEvent::Progress {
                        generation,
                        percent,
                    });
                };
                compositor
                    .build_overview_cancellable(&mask, &registry, progress, is_stale)
                    .map(|raster| OverlayEvent::OverviewReady { generation, raster })
            }
            OverlayJob::AnalyzeConnectivity { mask, analyzer, .. } => {
                let report = analyzer.analyze(&mask);
                if is_stale() {
                    Err(OverlayError::Cancelled)
                } else {
                    Ok(OverlayEvent::ConnectivityReady { generation, report })
                }
            }
        }));

        match outcome {
            Ok(Ok(event)) => event,
            Ok(Err(OverlayError::Cancelled)) => {
                log::debug!("Overlay job {} cancelled", generation);
                OverlayEvent::Cancelled { generation }
            }
            Ok(Err(error)) => OverlayEvent::Failed { generation, error },
            Err(payload) => OverlayEvent::Failed {
                generation,
                error: OverlayError::WorkerPanicked(panic_message(payload.as_ref())),
            },
        }
    }
}

impl Drop for OverlayWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down overlay worker");

        // Abandon whatever is running so the join below is quick.
        self.latest_generation.fetch_add(1, Ordering::AcqRel);
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take()
            && let Err(e) = handle.join()
        {
            log::warn!("Overlay worker panicked: {:?}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
