//! # Trajectory recorder
//!
//! While armed, mirrors every transmitted command to the trajectory storage
//! collaborator. Capture has its own minimum interval, independent of the
//! throttler's send interval, decoupling what the vehicle receives from what
//! storage absorbs.
//!
//! Point writes are fire-and-forget: a background worker thread consumes a
//! channel and performs the storage requests, observing failures only to log
//! them. A storage outage can therefore never stall or fail the in-progress
//! motion command transmission.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use crate::storage_client::{StorageError, TrajectoryStore};
use comms_if::cmd::Command;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Records the outbound command stream to trajectory storage.
pub struct Recorder {
    store: Arc<dyn TrajectoryStore>,

    gate: CaptureGate,

    /// Identifier of the trajectory being recorded, `None` when disarmed
    active_id: Option<u64>,

    point_tx: Sender<Command>,
}

/// Minimum-interval gate for point capture.
pub(crate) struct CaptureGate {
    min_interval: Duration,

    last_capture: Option<Instant>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by recording session operations.
///
/// None of these change the session state: a failed `arm` leaves the
/// recorder disarmed, a failed `disarm` on a disarmed recorder is a no-op.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("A recording needs a non-blank name")]
    InvalidName,

    #[error("A recording session is already armed (trajectory {0})")]
    AlreadyArmed(u64),

    #[error("No recording session is armed")]
    NotArmed,

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Recorder {
    /// Create a new, disarmed recorder and spawn its capture worker.
    pub fn new(store: Arc<dyn TrajectoryStore>, min_capture_interval: Duration) -> Self {
        let (point_tx, point_rx) = channel();

        {
            let store = store.clone();
            thread::spawn(move || capture_worker(store, point_rx));
        }

        Self {
            store,
            gate: CaptureGate::new(min_capture_interval),
            active_id: None,
            point_tx,
        }
    }

    /// True if a recording session is armed.
    pub fn is_armed(&self) -> bool {
        self.active_id.is_some()
    }

    /// Start a recording session, opening a new trajectory server-side.
    ///
    /// Returns the identifier of the new trajectory.
    pub fn arm(&mut self, name: &str) -> Result<u64, RecorderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecorderError::InvalidName);
        }

        if let Some(id) = self.active_id {
            return Err(RecorderError::AlreadyArmed(id));
        }

        let id = self.store.start(name).map_err(RecorderError::Storage)?;

        self.active_id = Some(id);
        self.gate.reset();

        info!("Recording armed, trajectory {} (\"{}\")", id, name);

        Ok(id)
    }

    /// Stop the recording session, closing the trajectory.
    ///
    /// The trajectory is immutable from here on.
    pub fn disarm(&mut self) -> Result<(), RecorderError> {
        let id = match self.active_id {
            Some(id) => id,
            None => return Err(RecorderError::NotArmed),
        };

        // The local session ends whether or not the server acknowledges the
        // close, so the operator can always arm a new one
        self.active_id = None;

        info!("Recording disarmed, trajectory {} closed", id);

        self.store.stop().map_err(RecorderError::Storage)
    }

    /// Capture a command which has just been transmitted.
    ///
    /// Does nothing when disarmed or when the capture interval has not yet
    /// elapsed. Never blocks and never fails: the point is handed to the
    /// capture worker and any storage error is logged there.
    pub fn capture(&mut self, cmd: &Command, now: Instant) {
        if self.active_id.is_none() {
            return;
        }

        if !self.gate.try_pass(now) {
            return;
        }

        if self.point_tx.send(*cmd).is_err() {
            warn!("Capture worker is gone, point dropped");
        }
    }
}

impl CaptureGate {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_capture: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last_capture = None;
    }

    /// Returns true and records the capture time if the interval has
    /// elapsed since the previous capture.
    pub(crate) fn try_pass(&mut self, now: Instant) -> bool {
        let due = match self.last_capture {
            Some(t) => now.saturating_duration_since(t) >= self.min_interval,
            None => true,
        };

        if due {
            self.last_capture = Some(now);
        }

        due
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Worker loop posting captured points to storage.
///
/// Exits when the recorder (the sending end) is dropped.
fn capture_worker(store: Arc<dyn TrajectoryStore>, point_rx: Receiver<Command>) {
    while let Ok(cmd) = point_rx.recv() {
        if let Err(e) = store.point(&cmd) {
            warn!("Could not store trajectory point: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
