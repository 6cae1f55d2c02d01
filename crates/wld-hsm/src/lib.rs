//! Typed model of the HSM host interfaces used by the WLD router.
//!
//! The router never talks to hardware directly. Everything it needs from the
//! vendor host library is expressed here as Rust types and capability traits,
//! so the failover logic can run against real adapters or an emulator alike.
//!
//! # Modules
//!
//! - [`error`]: Message-dispatch status codes and the [`MdError`] type
//! - [`types`]: Type-safe identifiers (slot, adapter, embedded slot, handle)
//! - [`dispatch`]: The [`MessageDispatch`] capability (topology + send/receive)
//! - [`token`]: The [`TokenApi`] session capability and `CKR_*` return values
//! - [`fm`]: Request framing shared by the host and the function module
//!
//! # Example
//!
//! ```ignore
//! use wld_hsm::{fm, FmNumber, MessageDispatch, SlotId};
//!
//! fn check_key(md: &dyn MessageDispatch, slot: SlotId) -> wld_hsm::MdResult<u32> {
//!     let adapter = md.hsm_index_for_slot(slot)?;
//!     let embedded = md.embedded_slot_for_slot(slot)?;
//!     let request = fm::encode_key_check(embedded, 17.into());
//!     let reply = md.send_receive(adapter, 0, FmNumber::CUSTOM, &request, Default::default())?;
//!     Ok(reply.app_status)
//! }
//! ```

pub mod dispatch;
pub mod error;
pub mod fm;
pub mod token;
pub mod types;

pub use dispatch::{MdBuffer, MdReply, MessageDispatch};
pub use error::{MdError, MdResult, MdStatus};
pub use token::{CkRv, SessionHandle, TokenApi, TokenResult};
pub use types::{AdapterId, EmbeddedSlotId, FmNumber, HsmState, ObjectHandle, SlotId};
