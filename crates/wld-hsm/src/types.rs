//! Type-safe identifiers for the HSM host interfaces.
//!
//! Slots, adapters, embedded slots and object handles are all 32-bit words on
//! the wire. Wrapping each in its own type keeps a caller-facing slot from
//! being passed where an adapter index or an embedded slot is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the raw value.
            pub const fn as_raw(&self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Caller-facing slot identifier (one token partition).
    SlotId
);
id_type!(
    /// Index of a physical HSM adapter. Several slots may share one adapter.
    AdapterId
);
id_type!(
    /// Adapter-internal slot address used inside function-module requests.
    EmbeddedSlotId
);
id_type!(
    /// Token object handle.
    ObjectHandle
);

impl SlotId {
    /// Reserved "any slot" value. It lies outside the legal slot range.
    pub const WILDCARD: SlotId = SlotId(9999);

    /// Returns true if this is the wildcard sentinel.
    pub const fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD.0
    }
}

/// Function-module number addressed by a dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FmNumber(u16);

impl FmNumber {
    /// The custom function module loaded on the adapters.
    pub const CUSTOM: FmNumber = FmNumber(0x8000);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for FmNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Operational state reported by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HsmState {
    #[default]
    NormalOperation,
    Initializing,
    Halted,
    Decommissioned,
    Tampered,
    #[serde(skip)]
    Unknown(u32),
}

impl HsmState {
    /// Returns true only when the adapter can serve requests.
    pub fn is_operational(&self) -> bool {
        *self == HsmState::NormalOperation
    }
}

impl fmt::Display for HsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HsmState::NormalOperation => write!(f, "normal-operation"),
            HsmState::Initializing => write!(f, "initializing"),
            HsmState::Halted => write!(f, "halted"),
            HsmState::Decommissioned => write!(f, "decommissioned"),
            HsmState::Tampered => write!(f, "tampered"),
            HsmState::Unknown(raw) => write!(f, "unknown(0x{:x})", raw),
        }
    }
}
