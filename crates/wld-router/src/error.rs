//! Error types for the WLD router.

use std::io;

use thiserror::Error;
use wld_hsm::{AdapterId, MdStatus};

/// Result type alias for router operations.
pub type WldResult<T> = Result<T, WldError>;

/// Errors that can occur during router operations.
#[derive(Debug, Error)]
pub enum WldError {
    /// The partition table has not been built yet.
    #[error("WLD router not initialized")]
    NotInitialized,

    /// The partition table was already built. The existing table stays valid.
    #[error("WLD router already initialized")]
    AlreadyInitialized,

    /// Neither an explicit slot list nor a configured one yielded any slot.
    #[error("no WLD slot list configured")]
    NoConfigurationFound,

    /// Initialization finished without a single active slot.
    #[error("no active slot after initialization")]
    NoActiveSlot,

    /// Every slot in the table is inactive.
    #[error("no WLD slot available")]
    NoSlotAvailable,

    /// A wildcard send hit a transient failure on every reachable adapter.
    #[error("all adapters exhausted after {attempts} attempt(s)")]
    AllAdaptersExhausted {
        /// Number of send attempts made by the call.
        attempts: usize,
    },

    /// The transport reported a failure, surfaced unchanged.
    #[error("transport failed on adapter {adapter}: {status}")]
    Transport {
        /// Adapter the request was sent to.
        adapter: AdapterId,
        /// Status returned by the dispatch layer.
        status: MdStatus,
    },

    /// Router configuration could not be read or is invalid.
    #[error("invalid WLD configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// Reading a configuration file failed.
    #[error("failed to read WLD configuration: {0}")]
    Io(#[from] io::Error),
}

impl WldError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the legacy numeric status word for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | no slot available |
    /// | 2 | no slot list defined |
    /// | 3 | already initialized |
    /// | 4 | message-dispatch command error |
    pub fn code(&self) -> u32 {
        match self {
            WldError::NoActiveSlot
            | WldError::NoSlotAvailable
            | WldError::AllAdaptersExhausted { .. } => 1,
            WldError::NotInitialized
            | WldError::NoConfigurationFound
            | WldError::InvalidConfig { .. }
            | WldError::Io(_) => 2,
            WldError::AlreadyInitialized => 3,
            WldError::Transport { .. } => 4,
        }
    }

    /// Returns true if the caller may succeed by retrying later.
    ///
    /// Selection exhaustion clears only when the process is restarted with
    /// recovered adapters, so a later retry is a caller policy decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WldError::NoSlotAvailable | WldError::AllAdaptersExhausted { .. }
        )
    }

    /// Returns the transport status if this is a transport error.
    pub fn transport_status(&self) -> Option<MdStatus> {
        match self {
            WldError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
