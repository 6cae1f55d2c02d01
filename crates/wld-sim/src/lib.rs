//! Emulated HSM adapters for the WLD router.
//!
//! Stands in for the vendor host library: a TOML [`HsmProfile`] declares
//! adapters, their slots and the token objects on each slot, and
//! [`HsmSimulator`] serves both the message-dispatch and the token-session
//! capabilities from it. Adapter faults can be declared in the profile or
//! injected at runtime, which makes failover reproducible.

pub mod error;
pub mod fm_handler;
pub mod profile;
pub mod simulator;

pub use error::{ProfileError, Result};
pub use profile::{AdapterProfile, Fault, HsmProfile, ObjectProfile, SlotProfile, PROFILE_ENV};
pub use simulator::HsmSimulator;
