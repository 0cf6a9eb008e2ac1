use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to the user. Crashes and escapes are not errors, see
/// [`crate::satellite::OrbitStatus`].
#[derive(Error, Debug)]
pub enum SimError {
    /// Geolocation failed or returned an out-of-range fix
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// The Earth texture could not be read or decoded
    #[error("Failed to load the Earth texture {path:?}: {reason}")]
    AssetLoadFailure { path: PathBuf, reason: String },

    /// Rejected user input; nothing was mutated
    #[error("{0}")]
    InvalidUserInput(String),

    #[error("Invalid configuration in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
