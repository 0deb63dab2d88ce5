//! # Console Executable Parameters
//!
//! This module provides parameters for the console executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct ConsoleExecParams {
    /// Network endpoint for the vehicle command channel
    pub vehicle_endpoint: String,

    /// Base URL of the trajectory storage API
    pub storage_url: String,

    /// Minimum interval between transmitted commands in milliseconds.
    ///
    /// This is also the cycle period of the main loop, so that a held input
    /// is picked up within one tick.
    pub min_send_interval_ms: u64,

    /// Minimum interval between captured trajectory points in milliseconds,
    /// independent of the send interval
    pub min_capture_interval_ms: u64,

    /// Default inter-point interval for fixed-interval replay in
    /// milliseconds
    pub replay_fixed_interval_ms: u64,

    /// Horizontal centre of the joystick widget in pointer coordinates
    pub stick_centre_x: f64,

    /// Vertical centre of the joystick widget in pointer coordinates
    pub stick_centre_y: f64,

    /// Physical radius of the joystick widget
    pub stick_radius: f64,

    /// Top edge of the throttle widget in pointer coordinates
    pub throttle_top: f64,

    /// Height of the throttle widget
    pub throttle_height: f64,
}
