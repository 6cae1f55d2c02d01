//! Workload-distribution (WLD) router.
//!
//! Routes function-module calls across a pool of interchangeable HSM
//! adapters and keeps serving when individual adapters drop out.
//!
//! - [`WldRouter`]: Router object owning the partition table and its lock
//! - [`PartitionTable`]: Fixed-capacity slot → adapter table with health flags
//! - [`WldConfig`]: Slot list, capacity and legacy defaults
//! - [`SlotTarget`]: Pinned slot or wildcard dispatch
//! - [`WldError`]: Error taxonomy (configuration, selection, transport)
//!
//! # Lifecycle
//!
//! 1. [`WldRouter::initialize`] builds the table once, querying topology for
//!    every candidate slot. Slots whose adapter is not operational stay
//!    inactive.
//! 2. [`WldRouter::next_slot`] hands out active slots in round-robin order.
//! 3. [`WldRouter::send`] dispatches a request. A transient transport failure
//!    marks every slot of that adapter inactive; wildcard sends then retry on
//!    another slot.
//!
//! Inactive slots are never reactivated for the life of the router.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wld_hsm::{fm, FmNumber};
//! use wld_router::{SlotTarget, WldConfig, WldRouter};
//!
//! let router = WldRouter::new(Arc::new(dispatch), WldConfig::from_env());
//! router.initialize(None)?;
//!
//! let (slot, embedded) = router.next_slot()?;
//! let request = fm::encode_key_check(embedded, handle);
//! let reply = router.send(slot, FmNumber::CUSTOM, &request, Duration::ZERO)?;
//! ```

mod config;
mod dispatch;
mod error;
mod router;
mod stats;
mod table;

#[cfg(test)]
mod test_support;

pub use config::{parse_slot_list, WldConfig, DEFAULT_ADAPTER, MAX_WLD_PARTITIONS, SLOT_LIST_ENV};
pub use dispatch::{FmReply, SlotTarget};
pub use error::{WldError, WldResult};
pub use router::WldRouter;
pub use stats::WldStats;
pub use table::{PartitionEntry, PartitionTable};
