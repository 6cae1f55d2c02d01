//! Key-check function module.
//!
//! Runs on the adapter side: reads the embedded slot and object handle from
//! the request, looks up the credential object on that slot and confirms the
//! handle matches.

use tracing::debug;
use wld_hsm::fm::{self, FM_STATUS_ARGUMENTS_BAD, FM_STATUS_HANDLE_INVALID, FM_STATUS_OK};
use wld_hsm::{EmbeddedSlotId, MdBuffer, ObjectHandle, TokenResult};

/// Handles one key-check request and returns the application status word.
///
/// `find` looks up objects by label on an embedded slot. An error from it is
/// returned as the status.
pub fn handle_key_check<F>(request: &[MdBuffer], find: F) -> u32
where
    F: FnOnce(EmbeddedSlotId, &str) -> TokenResult<Vec<ObjectHandle>>,
{
    let args = match fm::decode_key_check(request) {
        Ok(args) => args,
        Err(e) => {
            debug!(error = %e, "Key check: malformed request");
            return FM_STATUS_ARGUMENTS_BAD;
        }
    };

    let found = match find(args.embedded_slot, fm::KEY_LABEL) {
        Ok(found) => found,
        Err(rv) => {
            debug!(embedded_slot = %args.embedded_slot, rv = %rv, "Key check: lookup failed");
            return rv.0;
        }
    };

    match found.as_slice() {
        [handle] if *handle == args.handle => FM_STATUS_OK,
        _ => {
            debug!(
                embedded_slot = %args.embedded_slot,
                key = %args.handle,
                found = found.len(),
                "Key check: handle mismatch"
            );
            FM_STATUS_HANDLE_INVALID
        }
    }
}
