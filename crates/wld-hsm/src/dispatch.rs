//! Message-dispatch capability.
//!
//! [`MessageDispatch`] covers the two things the router needs from the host
//! library: topology queries (which adapter owns a slot, what state that
//! adapter is in, which embedded slot the slot maps to) and the blocking
//! send/receive call that carries a function-module request to one adapter.

use std::time::Duration;

use crate::error::MdResult;
use crate::types::{AdapterId, EmbeddedSlotId, FmNumber, HsmState, SlotId};

/// One argument buffer of a function-module request.
///
/// A request is a list of buffers; a zero-length buffer terminates the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdBuffer {
    data: Vec<u8>,
}

impl MdBuffer {
    /// Creates a buffer holding `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Creates the zero-length terminator buffer.
    pub fn terminator() -> Self {
        Self::default()
    }

    /// Returns true if this is the terminator buffer.
    pub fn is_terminator(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reply to a successful send/receive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdReply {
    /// Response payload written by the function module (may be empty).
    pub payload: Vec<u8>,
    /// Application status word returned by the function module (0 = success).
    pub app_status: u32,
}

impl MdReply {
    pub fn new(payload: Vec<u8>, app_status: u32) -> Self {
        Self {
            payload,
            app_status,
        }
    }

    /// Reply with an empty payload.
    pub fn status_only(app_status: u32) -> Self {
        Self::new(Vec::new(), app_status)
    }
}

/// Capability for HSM topology queries and function-module dispatch.
///
/// Implementations must be safe to call from several threads at once; the
/// router never holds its own lock while calling into this trait.
pub trait MessageDispatch: Send + Sync {
    /// Prepares the dispatch layer. Called once before any other method.
    fn initialize(&self) -> MdResult<()> {
        Ok(())
    }

    /// Returns the adapter hosting `slot`.
    fn hsm_index_for_slot(&self, slot: SlotId) -> MdResult<AdapterId>;

    /// Returns the operational state of `adapter`.
    fn hsm_state(&self, adapter: AdapterId) -> MdResult<HsmState>;

    /// Returns the adapter-internal slot address for `slot`.
    fn embedded_slot_for_slot(&self, slot: SlotId) -> MdResult<EmbeddedSlotId>;

    /// Sends `request` to function module `fm_number` on `adapter` and waits
    /// for the reply.
    ///
    /// A zero `timeout` asks the dispatch layer to use its own default.
    fn send_receive(
        &self,
        adapter: AdapterId,
        originator_id: u32,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
    ) -> MdResult<MdReply>;
}
