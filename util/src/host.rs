//! Host environment utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable giving the root directory of the console software.
///
/// Parameter files and session directories are resolved relative to this
/// root.
pub const SW_ROOT_ENV_VAR: &str = "VAE_CONSOLE_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with resolving the software root.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable (VAE_CONSOLE_ROOT) is not set")]
    SwRootNotSet,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the console software from the environment.
pub fn get_console_sw_root() -> Result<PathBuf, HostError> {
    match env::var(SW_ROOT_ENV_VAR) {
        Ok(v) => Ok(PathBuf::from(v)),
        Err(_) => Err(HostError::SwRootNotSet),
    }
}
