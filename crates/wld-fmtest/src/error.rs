//! Error types for the sample application.

use thiserror::Error;
use wld_hsm::{CkRv, SlotId};
use wld_router::WldError;

/// Why a key-check iteration failed.
#[derive(Error, Debug)]
pub enum IterationError {
    /// The router had no slot left to offer
    #[error("no slot available: {0}")]
    NoSlot(#[source] WldError),

    /// A token call failed
    #[error("slot {slot}: {op} failed: {rv}")]
    Token {
        slot: SlotId,
        op: &'static str,
        rv: CkRv,
    },

    /// The credential object is missing or ambiguous
    #[error("slot {slot}: expected one key object, found {found}")]
    KeyNotFound { slot: SlotId, found: usize },

    /// The router rejected or failed the send
    #[error("slot {slot}: dispatch failed: {source}")]
    Dispatch {
        slot: SlotId,
        #[source]
        source: WldError,
    },

    /// The function module answered with a non-zero status
    #[error("slot {slot}: function module returned 0x{status:x}")]
    FmStatus { slot: SlotId, status: u32 },

    /// A worker task panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(String),
}

impl IterationError {
    pub(crate) fn token(slot: SlotId, op: &'static str, rv: CkRv) -> Self {
        Self::Token { slot, op, rv }
    }
}
