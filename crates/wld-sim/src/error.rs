//! Error types for the HSM emulator.

use std::io;

use thiserror::Error;

/// Profile loading and validation errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Reading the profile file failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The profile is not valid TOML or has the wrong shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// The profile parsed but describes an impossible topology
    #[error("Invalid profile: {0}")]
    Invalid(String),
}

/// Result type for emulator operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
