//! One key-check iteration.

use std::time::Duration;

use tracing::{debug, info, warn};
use wld_hsm::fm::{self, FM_STATUS_OK};
use wld_hsm::{AdapterId, EmbeddedSlotId, FmNumber, ObjectHandle, SessionHandle, SlotId, TokenApi};
use wld_router::{WldError, WldRouter};

use crate::error::IterationError;

/// Result of a successful iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    pub slot: SlotId,
    pub embedded_slot: EmbeddedSlotId,
    pub key: ObjectHandle,
    pub adapter: AdapterId,
    /// Slots tried, including the one that succeeded.
    pub slots_tried: usize,
}

/// Runs one key check on the next slot the router offers.
///
/// Opens a session on the slot, logs in with `pin`, finds the key object and
/// sends the key-check request pinned to that slot. When the adapter turns out
/// to be unreachable the router has already taken it out of rotation, so the
/// iteration moves on to the next slot. Every other failure ends it.
pub fn perform_fm_function(
    router: &WldRouter,
    token: &dyn TokenApi,
    pin: &str,
) -> Result<IterationOutcome, IterationError> {
    let mut slots_tried = 0;

    loop {
        let (slot, embedded_slot) = router.next_slot().map_err(IterationError::NoSlot)?;
        slots_tried += 1;
        debug!(slot = %slot, embedded_slot = %embedded_slot, "Trying slot");

        match try_slot(router, token, pin, slot, embedded_slot) {
            Ok((key, adapter)) => {
                info!(slot = %slot, embedded_slot = %embedded_slot, key = %key, adapter = %adapter, "Key check done");
                return Ok(IterationOutcome {
                    slot,
                    embedded_slot,
                    key,
                    adapter,
                    slots_tried,
                });
            }
            Err(IterationError::Dispatch { slot, source })
                if source.transport_status().is_some_and(|s| s.is_transient()) =>
            {
                warn!(slot = %slot, error = %source, "Adapter lost, moving to next slot");
            }
            Err(e) => return Err(e),
        }
    }
}

fn try_slot(
    router: &WldRouter,
    token: &dyn TokenApi,
    pin: &str,
    slot: SlotId,
    embedded_slot: EmbeddedSlotId,
) -> Result<(ObjectHandle, AdapterId), IterationError> {
    let session = token
        .open_session(slot)
        .map_err(|rv| IterationError::token(slot, "open session", rv))?;

    let result = check_key(router, token, session, pin, slot, embedded_slot);

    if let Err(rv) = token.close_session(session) {
        warn!(slot = %slot, rv = %rv, "Failed to close session");
    }
    result
}

fn check_key(
    router: &WldRouter,
    token: &dyn TokenApi,
    session: SessionHandle,
    pin: &str,
    slot: SlotId,
    embedded_slot: EmbeddedSlotId,
) -> Result<(ObjectHandle, AdapterId), IterationError> {
    token
        .login(session, pin)
        .map_err(|rv| IterationError::token(slot, "login", rv))?;

    let found = token
        .find_objects(session, fm::KEY_LABEL)
        .map_err(|rv| IterationError::token(slot, "find objects", rv))?;
    let key = match found.as_slice() {
        [key] => *key,
        _ => {
            return Err(IterationError::KeyNotFound {
                slot,
                found: found.len(),
            })
        }
    };

    let request = fm::encode_key_check(embedded_slot, key);
    let reply = router
        .send(slot, FmNumber::CUSTOM, &request, Duration::ZERO)
        .map_err(|source: WldError| IterationError::Dispatch { slot, source })?;

    if reply.app_status != FM_STATUS_OK {
        return Err(IterationError::FmStatus {
            slot,
            status: reply.app_status,
        });
    }
    Ok((key, reply.adapter))
}
