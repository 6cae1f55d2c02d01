//! Token session capability.
//!
//! The sample application opens a session on the chosen slot, logs in and
//! locates the credential object before it asks the router to dispatch. The
//! router itself never calls this API; it is modelled here so the application
//! and the emulator share one definition.

use std::fmt;

use crate::types::{ObjectHandle, SlotId};

/// Cryptoki-style return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CkRv(pub u32);

impl CkRv {
    pub const OK: CkRv = CkRv(0x0000);
    pub const SLOT_ID_INVALID: CkRv = CkRv(0x0003);
    pub const ARGUMENTS_BAD: CkRv = CkRv(0x0007);
    pub const FUNCTION_FAILED: CkRv = CkRv(0x0006);
    pub const OBJECT_HANDLE_INVALID: CkRv = CkRv(0x0082);
    pub const PIN_INCORRECT: CkRv = CkRv(0x00A0);
    pub const SESSION_HANDLE_INVALID: CkRv = CkRv(0x00B3);
    pub const TOKEN_NOT_PRESENT: CkRv = CkRv(0x00E0);
    pub const USER_NOT_LOGGED_IN: CkRv = CkRv(0x0101);

    pub fn is_ok(&self) -> bool {
        *self == CkRv::OK
    }
}

impl fmt::Display for CkRv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            CkRv::OK => "CKR_OK",
            CkRv::SLOT_ID_INVALID => "CKR_SLOT_ID_INVALID",
            CkRv::ARGUMENTS_BAD => "CKR_ARGUMENTS_BAD",
            CkRv::FUNCTION_FAILED => "CKR_FUNCTION_FAILED",
            CkRv::OBJECT_HANDLE_INVALID => "CKR_OBJECT_HANDLE_INVALID",
            CkRv::PIN_INCORRECT => "CKR_PIN_INCORRECT",
            CkRv::SESSION_HANDLE_INVALID => "CKR_SESSION_HANDLE_INVALID",
            CkRv::TOKEN_NOT_PRESENT => "CKR_TOKEN_NOT_PRESENT",
            CkRv::USER_NOT_LOGGED_IN => "CKR_USER_NOT_LOGGED_IN",
            CkRv(raw) => return write!(f, "CKR(0x{:x})", raw),
        };
        write!(f, "{}", name)
    }
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, CkRv>;

/// Handle of an open token session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Capability for token sessions on a caller-facing slot.
pub trait TokenApi: Send + Sync {
    /// Opens a read/write session on `slot`.
    fn open_session(&self, slot: SlotId) -> TokenResult<SessionHandle>;

    /// Logs the crypto officer in on `session`.
    fn login(&self, session: SessionHandle, pin: &str) -> TokenResult<()>;

    /// Returns every object on the session's token whose label is `label`.
    fn find_objects(&self, session: SessionHandle, label: &str) -> TokenResult<Vec<ObjectHandle>>;

    /// Closes `session`. Closing an unknown session is reported, not fatal.
    fn close_session(&self, session: SessionHandle) -> TokenResult<()>;
}
