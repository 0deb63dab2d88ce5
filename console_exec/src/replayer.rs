//! # Trajectory replayer
//!
//! Plays a stored trajectory back through the vehicle command channel.
//!
//! The replayer is a stepped state machine driven from the main cyclic loop
//! rather than a blocking playback routine, so the channel keeps being
//! polled and operator commands keep being handled while a replay runs.
//! Each call to [`Replayer::step`] transmits at most one point, whichever is
//! due.
//!
//! Two timing modes are supported: a fixed inter-point interval, and
//! respecting the recorded capture timestamps with the gap between
//! consecutive points clamped into [5 ms, 1 s]. The clamp keeps a trajectory
//! recorded across a long pause from stalling playback, and a burst of
//! near-coincident points from flooding the channel.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use std::time::{Duration, Instant};

// Internal
use crate::storage_client::{StorageError, TrajectoryStore};
use comms_if::{cmd::Command, traj::RecordedPoint};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Shortest allowed gap between two replayed points.
const MIN_POINT_GAP: Duration = Duration::from_millis(5);

/// Longest allowed gap between two replayed points.
const MAX_POINT_GAP: Duration = Duration::from_millis(1000);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Stepped playback of one stored trajectory.
pub struct Replayer {
    /// Identifier of the trajectory being replayed
    id: u64,

    points: Vec<RecordedPoint>,

    timing: ReplayTiming,

    /// Index of the next point to transmit
    next_index: usize,

    /// Number of points transmitted so far
    sent: usize,

    /// When the next point is due, `None` means immediately
    next_due: Option<Instant>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Inter-point timing mode for a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayTiming {
    /// Transmit points at a fixed interval, ignoring recorded timestamps.
    FixedInterval(Duration),

    /// Reproduce the recorded capture timing, clamped into
    /// [5 ms, 1 s] per gap.
    RespectRecorded,
}

/// Outcome of one replay step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStep {
    /// The next point is not due yet.
    Waiting,

    /// The point at `index` was transmitted.
    Sent { index: usize },

    /// All points have been transmitted, the replay is finished.
    Complete { sent: usize },

    /// The command channel refused a point, the replay is aborted.
    ChannelClosed { sent: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Trajectory {0} has no points")]
    Empty(u64),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Replayer {
    /// Fetch the identified trajectory from storage and prepare a replay.
    ///
    /// The storage server reports an unknown identifier as an empty point
    /// list, so a missing trajectory surfaces as [`ReplayError::Empty`].
    /// Storage-level failures surface as [`ReplayError::Storage`].
    pub fn fetch(
        store: &dyn TrajectoryStore,
        id: u64,
        timing: ReplayTiming,
    ) -> Result<Self, ReplayError> {
        let points = store.points(id).map_err(ReplayError::Storage)?;

        Self::from_points(id, points, timing)
    }

    /// Prepare a replay over the given points.
    pub fn from_points(
        id: u64,
        points: Vec<RecordedPoint>,
        timing: ReplayTiming,
    ) -> Result<Self, ReplayError> {
        if points.is_empty() {
            return Err(ReplayError::Empty(id));
        }

        info!("Replay of trajectory {} ready, {} points", id, points.len());

        Ok(Self {
            id,
            points,
            timing,
            next_index: 0,
            sent: 0,
            next_due: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Advance the replay by at most one point.
    ///
    /// `send` is the channel choke point: it returns whether the command was
    /// actually transmitted. A refused send aborts the replay with the count
    /// of points which made it out.
    ///
    /// Stored points carry only wire fields once the capture timestamp is
    /// stripped; any point which strips to an empty command is skipped
    /// without consuming its slot in the timing schedule.
    pub fn step(&mut self, now: Instant, send: &mut dyn FnMut(&Command) -> bool) -> ReplayStep {
        if let Some(due) = self.next_due {
            if now < due {
                return ReplayStep::Waiting;
            }
        }

        // Skip over points with no wire payload
        while self.next_index < self.points.len() {
            if !self.points[self.next_index].strip().is_empty() {
                break;
            }
            self.next_index += 1;
        }

        if self.next_index >= self.points.len() {
            return ReplayStep::Complete { sent: self.sent };
        }

        let index = self.next_index;
        let cmd = self.points[index].strip();

        if !send(&cmd) {
            return ReplayStep::ChannelClosed { sent: self.sent };
        }

        self.sent += 1;
        self.next_index += 1;

        if self.next_index >= self.points.len() {
            return ReplayStep::Complete { sent: self.sent };
        }

        self.next_due = Some(now + self.gap_after(index));

        ReplayStep::Sent { index }
    }

    /// Gap to wait between the point at `index` and its successor.
    fn gap_after(&self, index: usize) -> Duration {
        match self.timing {
            ReplayTiming::FixedInterval(interval) => interval,
            ReplayTiming::RespectRecorded => {
                let prev_ts = self.points[index].ts.unwrap_or(0.0);
                let next_ts = self.points[index + 1].ts.unwrap_or(0.0);

                let delta = (next_ts - prev_ts).max(0.0);
                let delta = Duration::from_secs_f64(delta);

                delta.clamp(MIN_POINT_GAP, MAX_POINT_GAP)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::recorder::Recorder;
    use comms_if::traj::TrajectoryInfo;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Storage stand-in serving a fixed point list and recording captures.
    #[derive(Default)]
    struct StubStore {
        stored: Vec<RecordedPoint>,
        fail: bool,
        captured: Mutex<Vec<Command>>,
    }

    impl TrajectoryStore for StubStore {
        fn start(&self, _name: &str) -> Result<u64, StorageError> {
            Ok(2)
        }

        fn stop(&self) -> Result<(), StorageError> {
            Ok(())
        }

        fn point(&self, cmd: &Command) -> Result<(), StorageError> {
            self.captured.lock().unwrap().push(*cmd);
            Ok(())
        }

        fn list(&self) -> Result<Vec<TrajectoryInfo>, StorageError> {
            Ok(vec![])
        }

        fn points(&self, _id: u64) -> Result<Vec<RecordedPoint>, StorageError> {
            if self.fail {
                return Err(StorageError::Rejected("internal server error".into()));
            }
            Ok(self.stored.clone())
        }
    }

    fn point(ts: f64, angle: f64, ac: u8) -> RecordedPoint {
        RecordedPoint {
            ts: Some(ts),
            angle: Some(angle),
            ac: Some(ac),
            en: None,
        }
    }

    /// Drive a replay to its end, returning the transmitted commands and
    /// the elapsed time at which each went out.
    fn run_to_end(mut rep: Replayer) -> (Vec<Command>, Vec<Duration>, ReplayStep) {
        let mut now = Instant::now();
        let start = now;
        let mut sent = Vec::new();
        let mut sent_at = Vec::new();

        loop {
            let elapsed = now - start;
            let mut send = |cmd: &Command| {
                sent.push(*cmd);
                sent_at.push(elapsed);
                true
            };

            match rep.step(now, &mut send) {
                ReplayStep::Waiting => now += Duration::from_millis(1),
                ReplayStep::Sent { .. } => (),
                step => return (sent, sent_at, step),
            }
        }
    }

    #[test]
    fn test_empty_trajectory_rejected() {
        let res = Replayer::from_points(3, vec![], ReplayTiming::RespectRecorded);
        assert!(matches!(res, Err(ReplayError::Empty(3))));
    }

    #[test]
    fn test_fetch_prepares_a_replay() {
        let store = StubStore {
            stored: vec![point(0.0, 0.0, 10), point(0.5, 45.0, 20)],
            ..Default::default()
        };

        let rep = Replayer::fetch(&store, 7, ReplayTiming::RespectRecorded).unwrap();
        assert_eq!(rep.id(), 7);
    }

    #[test]
    fn test_fetch_unknown_id_is_empty() {
        // The storage server reports an unknown id as an empty point list
        let store = StubStore::default();

        let res = Replayer::fetch(&store, 9, ReplayTiming::RespectRecorded);
        assert!(matches!(res, Err(ReplayError::Empty(9))));
    }

    #[test]
    fn test_fetch_surfaces_storage_failures() {
        // A rejected request is a storage fault, not a missing trajectory
        let store = StubStore {
            fail: true,
            ..Default::default()
        };

        let res = Replayer::fetch(&store, 7, ReplayTiming::RespectRecorded);
        assert!(matches!(res, Err(ReplayError::Storage(_))));
    }

    #[test]
    fn test_recorded_timing_with_clamped_gaps() {
        // Gaps of 500 ms and 20 ms, both within the clamp
        let points = vec![point(0.0, 0.0, 10), point(0.5, 45.0, 20), point(0.52, 90.0, 30)];
        let rep = Replayer::from_points(1, points, ReplayTiming::RespectRecorded).unwrap();

        let (sent, sent_at, end) = run_to_end(rep);

        assert_eq!(end, ReplayStep::Complete { sent: 3 });
        assert_eq!(
            sent,
            vec![
                Command::motion(0.0, 10),
                Command::motion(45.0, 20),
                Command::motion(90.0, 30),
            ]
        );

        // First point goes out immediately, then the recorded gaps of
        // 500 ms and 20 ms
        assert_eq!(sent_at[0], Duration::from_millis(0));
        assert_eq!(sent_at[1], Duration::from_millis(500));
        assert_eq!(sent_at[2], Duration::from_millis(520));
    }

    #[test]
    fn test_gap_clamping() {
        // A 2 s pause clamps down to 1 s, a 1 ms burst clamps up to 5 ms
        let points = vec![point(0.0, 0.0, 10), point(2.0, 10.0, 10), point(2.001, 20.0, 10)];
        let rep = Replayer::from_points(1, points.clone(), ReplayTiming::RespectRecorded).unwrap();

        assert_eq!(rep.gap_after(0), Duration::from_millis(1000));
        assert_eq!(rep.gap_after(1), Duration::from_millis(5));
    }

    #[test]
    fn test_missing_timestamps_use_the_floor() {
        let points = vec![
            RecordedPoint {
                ts: None,
                angle: Some(0.0),
                ac: Some(10),
                en: None,
            },
            RecordedPoint {
                ts: None,
                angle: Some(5.0),
                ac: Some(10),
                en: None,
            },
        ];
        let rep = Replayer::from_points(1, points, ReplayTiming::RespectRecorded).unwrap();

        assert_eq!(rep.gap_after(0), MIN_POINT_GAP);
    }

    #[test]
    fn test_fixed_interval_ignores_timestamps() {
        let points = vec![point(0.0, 0.0, 10), point(9.0, 45.0, 20)];
        let rep =
            Replayer::from_points(1, points, ReplayTiming::FixedInterval(Duration::from_millis(80)))
                .unwrap();

        let (sent, sent_at, end) = run_to_end(rep);

        assert_eq!(end, ReplayStep::Complete { sent: 2 });
        assert_eq!(sent.len(), 2);
        assert_eq!(sent_at[1], Duration::from_millis(80));
    }

    #[test]
    fn test_timestamps_are_stripped_from_the_wire() {
        let points = vec![point(12.5, 30.0, 40)];
        let mut rep = Replayer::from_points(1, points, ReplayTiming::RespectRecorded).unwrap();

        let mut wire = Vec::new();
        let mut send = |cmd: &Command| {
            wire.push(serde_json::to_string(cmd).unwrap());
            true
        };

        assert_eq!(rep.step(Instant::now(), &mut send), ReplayStep::Complete { sent: 1 });
        assert!(!wire[0].contains("_ts"));
    }

    #[test]
    fn test_payloadless_points_are_skipped() {
        let points = vec![
            point(0.0, 0.0, 10),
            RecordedPoint {
                ts: Some(0.1),
                angle: None,
                ac: None,
                en: None,
            },
            point(0.2, 45.0, 20),
        ];
        let rep = Replayer::from_points(1, points, ReplayTiming::RespectRecorded).unwrap();

        let (sent, _, end) = run_to_end(rep);

        assert_eq!(end, ReplayStep::Complete { sent: 2 });
        assert_eq!(sent, vec![Command::motion(0.0, 10), Command::motion(45.0, 20)]);
    }

    #[test]
    fn test_replay_while_recording_composes_a_trajectory() {
        let store = Arc::new(StubStore {
            stored: vec![point(0.0, 0.0, 10), point(0.5, 45.0, 20)],
            ..Default::default()
        });

        let mut recorder = Recorder::new(store.clone(), Duration::from_millis(100));
        recorder.arm("derived").unwrap();

        let mut rep =
            Replayer::fetch(store.as_ref(), 7, ReplayTiming::RespectRecorded).unwrap();

        let mut now = Instant::now();
        loop {
            let t = now;
            // Transmit-then-capture, as the main loop wires it
            let mut send = |cmd: &Command| {
                recorder.capture(cmd, t);
                true
            };

            match rep.step(now, &mut send) {
                ReplayStep::Waiting => now += Duration::from_millis(1),
                ReplayStep::Sent { .. } => (),
                step => {
                    assert_eq!(step, ReplayStep::Complete { sent: 2 });
                    break;
                }
            }
        }

        // Give the capture worker time to drain its channel
        thread::sleep(Duration::from_millis(200));

        let captured = store.captured.lock().unwrap();
        assert_eq!(
            *captured,
            vec![Command::motion(0.0, 10), Command::motion(45.0, 20)]
        );
    }

    #[test]
    fn test_closed_channel_aborts_with_partial_count() {
        let points = vec![point(0.0, 0.0, 10), point(0.1, 10.0, 10), point(0.2, 20.0, 10)];
        let mut rep = Replayer::from_points(1, points, ReplayTiming::RespectRecorded).unwrap();

        let mut now = Instant::now();
        let mut live = true;
        let mut transmitted = 0usize;

        loop {
            let mut send = |_: &Command| {
                if live {
                    transmitted += 1;
                }
                live
            };

            match rep.step(now, &mut send) {
                ReplayStep::Waiting => now += Duration::from_millis(1),
                ReplayStep::Sent { .. } => {
                    // Drop the channel after the first point
                    live = false;
                }
                step => {
                    assert_eq!(step, ReplayStep::ChannelClosed { sent: 1 });
                    break;
                }
            }
        }

        assert_eq!(transmitted, 1);
    }
}
