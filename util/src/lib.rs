//! Utility library for the vehicle operator console

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod host;
pub mod logger;
pub mod maths;
pub mod params;
pub mod session;
pub mod time;
