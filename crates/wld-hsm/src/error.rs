//! Message-dispatch status codes and error handling.
//!
//! The host library reports every dispatch call with a raw status word. This
//! module turns those words into [`MdStatus`] and [`MdError`] so callers can
//! use `?` and match on the failure kind.

use std::fmt;
use thiserror::Error;

use crate::types::AdapterId;

/// Message-dispatch status codes.
///
/// Raw values follow the order of the host library's `MD_RV` definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MdStatus {
    Ok,
    /// The adapter could not be reached (link lost, adapter reset).
    Unsuccessful,
    /// The adapter reported an internal fault while handling the message.
    InternalError,
    InvalidHsmIndex,
    InvalidParameter,
    BufferTooSmall,
    Timeout,
    NotInitialized,
    NoMemory,
    /// A status word this crate does not know about.
    Unknown(u32),
}

impl MdStatus {
    /// Creates a status from a raw status word.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => MdStatus::Ok,
            1 => MdStatus::Unsuccessful,
            2 => MdStatus::InternalError,
            3 => MdStatus::InvalidHsmIndex,
            4 => MdStatus::InvalidParameter,
            5 => MdStatus::BufferTooSmall,
            6 => MdStatus::Timeout,
            7 => MdStatus::NotInitialized,
            8 => MdStatus::NoMemory,
            other => MdStatus::Unknown(other),
        }
    }

    /// Returns the raw status word.
    pub fn as_raw(&self) -> u32 {
        match self {
            MdStatus::Ok => 0,
            MdStatus::Unsuccessful => 1,
            MdStatus::InternalError => 2,
            MdStatus::InvalidHsmIndex => 3,
            MdStatus::InvalidParameter => 4,
            MdStatus::BufferTooSmall => 5,
            MdStatus::Timeout => 6,
            MdStatus::NotInitialized => 7,
            MdStatus::NoMemory => 8,
            MdStatus::Unknown(raw) => *raw,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_ok(&self) -> bool {
        *self == MdStatus::Ok
    }

    /// Returns true if the status means the adapter itself is unreachable.
    ///
    /// Only these two codes are treated as adapter-health signals. Everything
    /// else (bad arguments, timeouts raised by the function module) is a
    /// request-level failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, MdStatus::Unsuccessful | MdStatus::InternalError)
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> MdResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(MdError::from_status(self))
        }
    }
}

impl fmt::Display for MdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdStatus::Ok => write!(f, "MDR_OK"),
            MdStatus::Unsuccessful => write!(f, "MDR_UNSUCCESSFUL"),
            MdStatus::InternalError => write!(f, "MDR_INTERNAL_ERROR"),
            MdStatus::InvalidHsmIndex => write!(f, "MDR_INVALID_HSM_INDEX"),
            MdStatus::InvalidParameter => write!(f, "MDR_INVALID_PARAMETER"),
            MdStatus::BufferTooSmall => write!(f, "MDR_BUFFER_TOO_SMALL"),
            MdStatus::Timeout => write!(f, "MDR_TIMEOUT"),
            MdStatus::NotInitialized => write!(f, "MDR_NOT_INITIALIZED"),
            MdStatus::NoMemory => write!(f, "MDR_NO_MEMORY"),
            MdStatus::Unknown(raw) => write!(f, "MDR_UNKNOWN(0x{:x})", raw),
        }
    }
}

/// Error type for message-dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MdError {
    /// The dispatch layer returned a non-OK status.
    #[error("message dispatch failed: {status}")]
    Status { status: MdStatus },

    /// A topology lookup failed for the given adapter.
    #[error("adapter {adapter}: {status}")]
    Adapter { adapter: AdapterId, status: MdStatus },

    /// The dispatch layer has not been initialized.
    #[error("message dispatch not initialized")]
    NotInitialized,
}

impl MdError {
    /// Creates an error from a status code.
    pub fn from_status(status: MdStatus) -> Self {
        match status {
            MdStatus::NotInitialized => MdError::NotInitialized,
            _ => MdError::Status { status },
        }
    }

    /// Creates an error attributed to a specific adapter.
    pub fn adapter(adapter: AdapterId, status: MdStatus) -> Self {
        MdError::Adapter { adapter, status }
    }

    /// Returns the underlying status word.
    pub fn status(&self) -> MdStatus {
        match self {
            MdError::Status { status } | MdError::Adapter { status, .. } => *status,
            MdError::NotInitialized => MdStatus::NotInitialized,
        }
    }

    /// Returns true if this error signals an unreachable adapter.
    pub fn is_transient(&self) -> bool {
        self.status().is_transient()
    }
}

impl From<MdStatus> for MdError {
    fn from(status: MdStatus) -> Self {
        MdError::from_status(status)
    }
}

/// Result type for message-dispatch operations.
pub type MdResult<T> = Result<T, MdError>;
