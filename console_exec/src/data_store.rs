//! # Console Executable DataStore
//!
//! Central store for the state shared between the operator interface and the
//! command pipeline. Owned by the main cyclic loop, which derives the
//! candidate command for each cycle from it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::cmd::{Command, SpeedScale};

use crate::input::{scaled_throttle, StickInput};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Console Executable DataStore
#[derive(Default)]
pub struct DataStore {
    // CYCLE MANAGEMENT
    /// Number of cycles that have elapsed since the start of execution.
    pub num_cycles: u128,

    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    // OPERATOR STATE
    /// The selected speed scale, `None` until the operator picks one
    pub speed_scale: Option<SpeedScale>,

    /// Latest joystick input, `None` before the first stick event
    pub stick: Option<StickInput>,

    /// Latest raw throttle level, `None` before the first throttle event
    pub throttle_raw: Option<u8>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Derive the motion command reflecting the current operator state.
    ///
    /// Angle and throttle are always populated so that a recentred stick or
    /// a zeroed throttle is transmitted, not silently elided. The throttler
    /// downstream collapses the resulting repeats.
    pub fn current_command(&self) -> Command {
        let angle = self.stick.map_or(0.0, |s| s.angle_deg);
        let ac = scaled_throttle(self.throttle_raw.unwrap_or(0), self.speed_scale);

        Command::motion(angle, ac)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::input::idle_stick;

    #[test]
    fn test_initial_state_commands_idle() {
        let ds = DataStore::default();
        assert_eq!(ds.current_command(), Command::idle());
    }

    #[test]
    fn test_throttle_needs_a_speed_scale() {
        let mut ds = DataStore::default();
        ds.throttle_raw = Some(100);

        // No scale selected yet, no drive
        assert_eq!(ds.current_command(), Command::idle());

        ds.speed_scale = Some(SpeedScale::Medium);
        assert_eq!(ds.current_command(), Command::motion(0.0, 60));
    }

    #[test]
    fn test_stick_sets_angle() {
        let mut ds = DataStore {
            speed_scale: Some(SpeedScale::High),
            throttle_raw: Some(50),
            ..Default::default()
        };

        ds.stick = Some(StickInput {
            angle_deg: 45.0,
            magnitude: 1.0,
        });
        assert_eq!(ds.current_command(), Command::motion(45.0, 50));

        // Release recentres rather than holding the last heading
        ds.stick = Some(idle_stick());
        assert_eq!(ds.current_command(), Command::motion(0.0, 50));
    }
}
