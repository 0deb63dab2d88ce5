//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the console software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Motion command definitions, the atomic unit sent to the vehicle
pub mod cmd;

/// Trajectory definitions for the record/replay chain
pub mod traj;

/// Network module
pub mod net;
