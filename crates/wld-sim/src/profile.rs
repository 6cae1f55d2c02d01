//! HSM profile file.
//!
//! A profile describes the adapters the emulator exposes and the slots they
//! host. Example:
//!
//! ```toml
//! [[adapter]]
//! id = 0
//!
//! [[adapter]]
//! id = 1
//! state = "halted"
//!
//! [[adapter]]
//! id = 2
//! fault = "unsuccessful"
//! fail_after = 5
//!
//! [[slot]]
//! slot = 1
//! adapter = 0
//! embedded_slot = 0
//! pin = "userpin"
//!
//! [[slot.object]]
//! label = "MyAESKey"
//! handle = 17
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use wld_hsm::{AdapterId, EmbeddedSlotId, HsmState, MdStatus, ObjectHandle, SlotId};

use crate::error::{ProfileError, Result};

/// Environment variable naming the profile file.
pub const PROFILE_ENV: &str = "WLD_HSM_PROFILE";

/// Failure injected into an adapter's send/receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fault {
    #[default]
    None,
    /// Adapter unreachable.
    Unsuccessful,
    /// Adapter reports an internal error.
    InternalError,
    Timeout,
    InvalidParameter,
}

impl Fault {
    /// Status returned by a faulting send, if any.
    pub fn status(&self) -> Option<MdStatus> {
        match self {
            Fault::None => None,
            Fault::Unsuccessful => Some(MdStatus::Unsuccessful),
            Fault::InternalError => Some(MdStatus::InternalError),
            Fault::Timeout => Some(MdStatus::Timeout),
            Fault::InvalidParameter => Some(MdStatus::InvalidParameter),
        }
    }
}

/// One emulated adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterProfile {
    pub id: AdapterId,

    #[serde(default)]
    pub state: HsmState,

    #[serde(default)]
    pub fault: Fault,

    /// Sends served normally before the fault kicks in.
    #[serde(default)]
    pub fail_after: u64,
}

impl AdapterProfile {
    pub fn new(id: u32) -> Self {
        Self {
            id: AdapterId::new(id),
            state: HsmState::default(),
            fault: Fault::None,
            fail_after: 0,
        }
    }
}

/// A token object stored on a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProfile {
    pub label: String,
    pub handle: ObjectHandle,
}

/// One emulated slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotProfile {
    pub slot: SlotId,
    pub adapter: AdapterId,
    pub embedded_slot: EmbeddedSlotId,

    /// Crypto-officer pin.
    #[serde(default = "default_pin")]
    pub pin: String,

    #[serde(default, rename = "object")]
    pub objects: Vec<ObjectProfile>,
}

fn default_pin() -> String {
    "userpin".to_string()
}

impl SlotProfile {
    pub fn new(slot: u32, adapter: u32, embedded_slot: u32) -> Self {
        Self {
            slot: SlotId::new(slot),
            adapter: AdapterId::new(adapter),
            embedded_slot: EmbeddedSlotId::new(embedded_slot),
            pin: default_pin(),
            objects: Vec::new(),
        }
    }

    /// Adds an object to the slot.
    pub fn with_object(mut self, label: impl Into<String>, handle: u32) -> Self {
        self.objects.push(ObjectProfile {
            label: label.into(),
            handle: ObjectHandle::new(handle),
        });
        self
    }

    /// Handles of every object labelled `label`.
    pub fn find(&self, label: &str) -> Vec<ObjectHandle> {
        self.objects
            .iter()
            .filter(|o| o.label == label)
            .map(|o| o.handle)
            .collect()
    }
}

/// Complete emulator profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmProfile {
    #[serde(default, rename = "adapter")]
    pub adapters: Vec<AdapterProfile>,

    #[serde(default, rename = "slot")]
    pub slots: Vec<SlotProfile>,
}

impl HsmProfile {
    /// Loads and validates a profile file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| match e {
                ProfileError::Parse(msg) => {
                    ProfileError::Parse(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })
    }

    /// Parses and validates a profile.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let profile: HsmProfile =
            toml::from_str(content).map_err(|e| ProfileError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Checks that the topology is consistent.
    pub fn validate(&self) -> Result<()> {
        let mut adapters = HashSet::new();
        for adapter in &self.adapters {
            if !adapters.insert(adapter.id) {
                return Err(ProfileError::Invalid(format!(
                    "duplicate adapter {}",
                    adapter.id
                )));
            }
        }

        let mut slots = HashSet::new();
        let mut embedded = HashSet::new();
        for slot in &self.slots {
            if slot.slot.is_wildcard() {
                return Err(ProfileError::Invalid(format!(
                    "slot id {} is reserved",
                    slot.slot
                )));
            }
            if !slots.insert(slot.slot) {
                return Err(ProfileError::Invalid(format!("duplicate slot {}", slot.slot)));
            }
            if !adapters.contains(&slot.adapter) {
                return Err(ProfileError::Invalid(format!(
                    "slot {} references undeclared adapter {}",
                    slot.slot, slot.adapter
                )));
            }
            if !embedded.insert((slot.adapter, slot.embedded_slot)) {
                return Err(ProfileError::Invalid(format!(
                    "embedded slot {} used twice on adapter {}",
                    slot.embedded_slot, slot.adapter
                )));
            }
        }
        Ok(())
    }

    pub fn slot(&self, slot: SlotId) -> Option<&SlotProfile> {
        self.slots.iter().find(|s| s.slot == slot)
    }

    /// Finds the slot living at `embedded_slot` on `adapter`.
    pub fn embedded(&self, adapter: AdapterId, embedded_slot: EmbeddedSlotId) -> Option<&SlotProfile> {
        self.slots
            .iter()
            .find(|s| s.adapter == adapter && s.embedded_slot == embedded_slot)
    }

    /// Slot ids in declaration order.
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(|s| s.slot).collect()
    }
}
