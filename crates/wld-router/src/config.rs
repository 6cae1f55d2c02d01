//! Router configuration.
//!
//! The slot list is a string of unsigned integers separated by spaces and/or
//! commas, e.g. `"1, 2 5,6"`. It usually comes from the `WLD_SLOT_LIST`
//! environment variable and is consumed once, at initialization.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use wld_hsm::{AdapterId, SlotId};

use crate::error::{WldError, WldResult};

/// Environment variable holding the slot list.
pub const SLOT_LIST_ENV: &str = "WLD_SLOT_LIST";

/// Maximum number of partitions in the table.
pub const MAX_WLD_PARTITIONS: usize = 20;

/// Adapter used when a pinned slot is not in the table.
pub const DEFAULT_ADAPTER: AdapterId = AdapterId::new(3);

/// WLD router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WldConfig {
    /// Delimited slot list used when no explicit list is passed to initialize.
    #[serde(default)]
    pub slot_list: Option<String>,

    /// Adapter substituted for slots that are not in the table.
    #[serde(default = "default_adapter")]
    pub default_adapter: AdapterId,

    /// Table capacity. Extra candidate slots are dropped.
    #[serde(default = "default_max_partitions")]
    pub max_partitions: usize,

    /// Originator id passed to every send.
    #[serde(default)]
    pub originator_id: u32,
}

fn default_adapter() -> AdapterId {
    DEFAULT_ADAPTER
}

fn default_max_partitions() -> usize {
    MAX_WLD_PARTITIONS
}

impl Default for WldConfig {
    fn default() -> Self {
        Self {
            slot_list: None,
            default_adapter: default_adapter(),
            max_partitions: default_max_partitions(),
            originator_id: 0,
        }
    }
}

impl WldConfig {
    /// Default configuration with the slot list taken from `WLD_SLOT_LIST`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Replaces the slot list with `WLD_SLOT_LIST` when that variable is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(list) = std::env::var(SLOT_LIST_ENV) {
            self.slot_list = Some(list);
        }
        self
    }

    /// Sets the slot list.
    pub fn with_slot_list(mut self, list: impl Into<String>) -> Self {
        self.slot_list = Some(list.into());
        self
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> WldResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: WldConfig = toml::from_str(&content).map_err(|e| {
            WldError::invalid_config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> WldResult<()> {
        if self.max_partitions == 0 {
            return Err(WldError::invalid_config("max_partitions must be at least 1"));
        }
        Ok(())
    }

    /// Picks the candidate slots: `explicit` when non-empty, otherwise the
    /// parsed slot list.
    pub fn candidate_slots(&self, explicit: Option<&[SlotId]>) -> WldResult<Vec<SlotId>> {
        if let Some(slots) = explicit.filter(|s| !s.is_empty()) {
            return Ok(slots.to_vec());
        }

        let parsed = self
            .slot_list
            .as_deref()
            .map(parse_slot_list)
            .unwrap_or_default();

        if parsed.is_empty() {
            return Err(WldError::NoConfigurationFound);
        }
        Ok(parsed)
    }
}

/// Parses a space and/or comma delimited list of slot ids.
///
/// Tokens that are not unsigned integers are skipped.
pub fn parse_slot_list(list: &str) -> Vec<SlotId> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<u32>() {
            Ok(raw) => Some(SlotId::new(raw)),
            Err(e) => {
                warn!(token, error = %e, "Ignoring invalid slot id in slot list");
                None
            }
        })
        .collect()
}
