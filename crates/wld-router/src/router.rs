//! Router object: table initialization, slot selection and health tracking.
//!
//! All mutable state (table, cursor, initialized flag) sits behind a single
//! mutex. Every critical section is one pass over a small table; calls into
//! [`MessageDispatch`] are always made with the lock released.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wld_hsm::{AdapterId, EmbeddedSlotId, MessageDispatch, SlotId};

use crate::config::WldConfig;
use crate::error::{WldError, WldResult};
use crate::stats::{StatsCounters, WldStats};
use crate::table::{PartitionEntry, PartitionTable};

#[derive(Debug)]
struct RouterState {
    table: PartitionTable,
    /// Index of the last slot handed out by the selector.
    cursor: Option<usize>,
    initialized: bool,
}

/// A slot chosen by the selector together with its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selection {
    pub slot: SlotId,
    pub embedded_slot: EmbeddedSlotId,
    pub adapter: AdapterId,
}

/// Workload-distribution router.
///
/// Create one per dispatch layer and share it (e.g. in an `Arc`) between
/// threads. Independent routers never share state.
pub struct WldRouter {
    pub(crate) dispatch: Arc<dyn MessageDispatch>,
    pub(crate) config: WldConfig,
    state: Mutex<RouterState>,
    pub(crate) stats: StatsCounters,
}

impl fmt::Debug for WldRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WldRouter")
            .field("config", &self.config)
            .field("initialized", &state.initialized)
            .field("partitions", &state.table.len())
            .field("active", &state.table.active_count())
            .finish()
    }
}

impl WldRouter {
    /// Creates an uninitialized router.
    pub fn new(dispatch: Arc<dyn MessageDispatch>, config: WldConfig) -> Self {
        let capacity = config.max_partitions;
        Self {
            dispatch,
            config,
            state: Mutex::new(RouterState {
                table: PartitionTable::with_capacity(capacity),
                cursor: None,
                initialized: false,
            }),
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &WldConfig {
        &self.config
    }

    /// Builds the partition table.
    ///
    /// Uses `explicit_slots` when non-empty, otherwise the configured slot
    /// list. Each candidate is checked against the backend topology; a slot is
    /// active only if its adapter reports normal operation and its embedded
    /// slot can be resolved. Lookup failures leave the slot inactive.
    ///
    /// Returns the number of active slots.
    ///
    /// # Errors
    ///
    /// - [`WldError::AlreadyInitialized`] if a table already exists; it is
    ///   left untouched and stays usable.
    /// - [`WldError::NoConfigurationFound`] if no candidate slot was found.
    /// - [`WldError::NoActiveSlot`] if no slot ended up active. The router
    ///   still counts as initialized.
    pub fn initialize(&self, explicit_slots: Option<&[SlotId]>) -> WldResult<usize> {
        if self.is_initialized() {
            return Err(WldError::AlreadyInitialized);
        }

        let candidates = self.config.candidate_slots(explicit_slots)?;
        let table = self.build_table(&candidates);

        let active = {
            let mut state = self.state.lock();
            if state.initialized {
                return Err(WldError::AlreadyInitialized);
            }
            state.table = table;
            state.cursor = None;
            state.initialized = true;
            dump_table(&state.table);
            state.table.active_count()
        };

        info!(
            candidates = candidates.len(),
            partitions = self.partition_count(),
            active,
            "WLD partition table initialized"
        );

        if active == 0 {
            return Err(WldError::NoActiveSlot);
        }
        Ok(active)
    }

    fn build_table(&self, candidates: &[SlotId]) -> PartitionTable {
        let mut table = PartitionTable::with_capacity(self.config.max_partitions);

        for &slot in candidates {
            if table.is_full() {
                warn!(
                    slot = %slot,
                    capacity = table.capacity(),
                    "Partition table full, dropping remaining slots"
                );
                break;
            }
            if table.position(slot).is_some() {
                warn!(slot = %slot, "Duplicate slot in slot list, ignoring");
                continue;
            }
            table.push(self.probe_slot(slot));
        }
        table
    }

    /// Queries topology for one slot and returns its table entry.
    fn probe_slot(&self, slot: SlotId) -> PartitionEntry {
        let mut entry = PartitionEntry::new(slot);

        let adapter = match self.dispatch.hsm_index_for_slot(slot) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Error setting up WLD table: adapter lookup failed");
                return entry;
            }
        };
        entry.set_adapter(adapter);

        match self.dispatch.hsm_state(adapter) {
            Ok(state) if state.is_operational() => {}
            Ok(state) => {
                warn!(slot = %slot, adapter = %adapter, hsm_state = %state, "Error setting up WLD table: adapter not operational");
                return entry;
            }
            Err(e) => {
                warn!(slot = %slot, adapter = %adapter, error = %e, "Error setting up WLD table: adapter state query failed");
                return entry;
            }
        }

        match self.dispatch.embedded_slot_for_slot(slot) {
            Ok(embedded) => entry.activate(embedded),
            Err(e) => {
                warn!(slot = %slot, adapter = %adapter, error = %e, "Error setting up WLD table: embedded slot lookup failed");
            }
        }
        entry
    }

    /// Returns the next active slot in round-robin order, with its embedded
    /// slot address.
    ///
    /// # Errors
    ///
    /// - [`WldError::NotInitialized`] before a successful [`initialize`](Self::initialize).
    /// - [`WldError::NoSlotAvailable`] if every slot is inactive.
    pub fn next_slot(&self) -> WldResult<(SlotId, EmbeddedSlotId)> {
        self.select().map(|s| (s.slot, s.embedded_slot))
    }

    /// Scan-and-advance in one critical section.
    pub(crate) fn select(&self) -> WldResult<Selection> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(WldError::NotInitialized);
        }

        let index = state
            .table
            .next_active(state.cursor)
            .ok_or(WldError::NoSlotAvailable)?;
        let entry = state
            .table
            .entry_at(index)
            .ok_or(WldError::NoSlotAvailable)?;
        let adapter = entry.adapter().ok_or(WldError::NoSlotAvailable)?;
        let selection = Selection {
            slot: entry.slot(),
            embedded_slot: entry.embedded_slot(),
            adapter,
        };

        // Only a usable selection moves the cursor
        state.cursor = Some(index);
        debug!(slot = %selection.slot, adapter = %adapter, index, "Selected WLD slot");
        Ok(selection)
    }

    /// Marks every slot hosted by `adapter` inactive.
    ///
    /// Idempotent. Does nothing on an uninitialized router or for an adapter
    /// that is not in the table.
    pub fn mark_adapter_unhealthy(&self, adapter: AdapterId) {
        let changed = {
            let mut state = self.state.lock();
            if !state.initialized {
                return;
            }
            state.table.deactivate_adapter(adapter)
        };

        if changed > 0 {
            warn!(adapter = %adapter, slots = changed, "Marked adapter inactive");
        }
    }

    /// Resolves the adapter for a pinned slot.
    ///
    /// A slot that is not in the table, or whose adapter lookup failed,
    /// resolves to the configured default adapter.
    pub(crate) fn resolve_adapter(&self, slot: SlotId) -> AdapterId {
        let adapter = {
            let state = self.state.lock();
            state.table.get(slot).and_then(PartitionEntry::adapter)
        };

        adapter.unwrap_or_else(|| {
            warn!(
                slot = %slot,
                default_adapter = %self.config.default_adapter,
                "Slot not in WLD table, using default adapter"
            );
            self.config.default_adapter
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Returns a copy of the partition table.
    pub fn partitions(&self) -> Vec<PartitionEntry> {
        self.state.lock().table.entries().to_vec()
    }

    pub fn partition_count(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().table.active_count()
    }

    /// Returns dispatch counters.
    pub fn stats(&self) -> WldStats {
        self.stats.snapshot()
    }
}

fn dump_table(table: &PartitionTable) {
    for entry in table.entries() {
        debug!(
            slot = %entry.slot(),
            active = entry.is_active(),
            adapter = ?entry.adapter().map(|a| a.as_raw()),
            embedded_slot = %entry.embedded_slot(),
            "WLD partition"
        );
    }
}
