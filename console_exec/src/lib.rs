//! Operator console library.
//!
//! Implements the real-time command pipeline of the console:
//!
//! - [`input`] - normalises raw pointer geometry into heading/throttle
//! - [`throttler`] - rate-limits and deduplicates the outbound stream
//! - [`vehicle_client`] - owns the duplex channel to the vehicle
//! - [`recorder`] - mirrors outbound commands to trajectory storage
//! - [`replayer`] - re-emits stored trajectories through the same channel
//! - [`storage_client`] - client for the trajectory storage HTTP API

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod data_store;
pub mod input;
pub mod operator;
pub mod params;
pub mod recorder;
pub mod replayer;
pub mod storage_client;
pub mod throttler;
pub mod vehicle_client;
