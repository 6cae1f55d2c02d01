//! Partition table.
//!
//! One [`PartitionEntry`] per configured slot, appended only while the router
//! initializes. After that the `active` flag is the only thing that changes.

use wld_hsm::{AdapterId, EmbeddedSlotId, SlotId};

/// One row of the partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    slot: SlotId,
    active: bool,
    embedded_slot: EmbeddedSlotId,
    adapter: Option<AdapterId>,
}

impl PartitionEntry {
    /// Creates an inactive entry with no topology attached.
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            active: false,
            embedded_slot: EmbeddedSlotId::new(0),
            adapter: None,
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Embedded slot address. Meaningful only for active entries.
    pub fn embedded_slot(&self) -> EmbeddedSlotId {
        self.embedded_slot
    }

    /// Owning adapter, if the topology lookup got that far.
    pub fn adapter(&self) -> Option<AdapterId> {
        self.adapter
    }

    pub(crate) fn set_adapter(&mut self, adapter: AdapterId) {
        self.adapter = Some(adapter);
    }

    pub(crate) fn activate(&mut self, embedded_slot: EmbeddedSlotId) {
        self.embedded_slot = embedded_slot;
        self.active = true;
    }
}

/// Fixed-capacity partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    entries: Vec<PartitionEntry>,
    capacity: usize,
}

impl PartitionTable {
    /// Creates an empty table holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry.
    ///
    /// Returns false, dropping the entry, when the table is full or the slot
    /// is already present.
    pub fn push(&mut self, entry: PartitionEntry) -> bool {
        if self.is_full() || self.position(entry.slot).is_some() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    /// Returns the index of `slot`.
    pub fn position(&self, slot: SlotId) -> Option<usize> {
        self.entries.iter().position(|e| e.slot == slot)
    }

    pub fn get(&self, slot: SlotId) -> Option<&PartitionEntry> {
        self.entries.iter().find(|e| e.slot == slot)
    }

    pub fn entry_at(&self, index: usize) -> Option<&PartitionEntry> {
        self.entries.get(index)
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    /// Finds the next active entry after `cursor`, wrapping around.
    ///
    /// With no cursor the scan starts at index 0. The entry at the cursor is
    /// examined last, so a single active entry is returned again and again.
    pub fn next_active(&self, cursor: Option<usize>) -> Option<usize> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let start = cursor.map_or(len - 1, |c| c % len);

        (1..=len)
            .map(|step| (start + step) % len)
            .find(|&index| self.entries[index].active)
    }

    /// Marks every entry of `adapter` inactive. Returns how many entries
    /// changed state.
    pub fn deactivate_adapter(&mut self, adapter: AdapterId) -> usize {
        let mut changed = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.adapter == Some(adapter))
        {
            if entry.active {
                entry.active = false;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(slot: u32, adapter: u32, active: bool) -> PartitionEntry {
        let mut e = PartitionEntry::new(SlotId::new(slot));
        e.set_adapter(AdapterId::new(adapter));
        if active {
            e.activate(EmbeddedSlotId::new(slot + 100));
        }
        e
    }

    fn table(entries: Vec<PartitionEntry>) -> PartitionTable {
        let mut t = PartitionTable::with_capacity(8);
        for e in entries {
            assert!(t.push(e));
        }
        t
    }

    fn walk(t: &PartitionTable, mut cursor: Option<usize>, n: usize) -> Vec<u32> {
        let mut out = Vec::new();
        for _ in 0..n {
            let index = t.next_active(cursor).unwrap();
            out.push(t.entry_at(index).unwrap().slot().as_raw());
            cursor = Some(index);
        }
        out
    }

    #[test]
    fn test_entries_start_inactive() {
        let mut e = PartitionEntry::new(SlotId::new(4));
        assert!(!e.is_active());
        assert_eq!(e.adapter(), None);

        e.set_adapter(AdapterId::new(2));
        assert!(!e.is_active());
        e.activate(EmbeddedSlotId::new(7));
        assert!(e.is_active());
        assert_eq!(e.embedded_slot(), EmbeddedSlotId::new(7));
    }

    #[test]
    fn test_push_respects_capacity_and_uniqueness() {
        let mut t = PartitionTable::with_capacity(2);
        assert!(t.push(PartitionEntry::new(SlotId::new(1))));
        assert!(!t.push(PartitionEntry::new(SlotId::new(1))));
        assert!(t.push(PartitionEntry::new(SlotId::new(2))));
        assert!(!t.push(PartitionEntry::new(SlotId::new(3))));
        assert_eq!(t.len(), 2);
        assert!(t.is_full());
    }

    #[test]
    fn test_round_robin_from_start() {
        let t = table(vec![entry(1, 0, true), entry(2, 0, true), entry(3, 1, true)]);
        assert_eq!(walk(&t, None, 4), vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_round_robin_resumes_after_cursor() {
        let t = table(vec![entry(1, 0, true), entry(2, 0, true), entry(3, 1, true)]);
        assert_eq!(walk(&t, Some(1), 3), vec![3, 1, 2]);
    }

    #[test]
    fn test_skips_inactive() {
        let t = table(vec![entry(1, 0, true), entry(2, 0, false), entry(3, 1, true)]);
        assert_eq!(walk(&t, None, 4), vec![1, 3, 1, 3]);
    }

    #[test]
    fn test_single_active_entry_repeats() {
        let t = table(vec![entry(1, 0, false), entry(2, 1, true)]);
        assert_eq!(walk(&t, Some(1), 3), vec![2, 2, 2]);
    }

    #[test]
    fn test_no_active_entry() {
        let t = table(vec![entry(1, 0, false), entry(2, 1, false)]);
        assert_eq!(t.next_active(None), None);
        assert_eq!(t.next_active(Some(0)), None);
        assert_eq!(PartitionTable::with_capacity(4).next_active(None), None);
    }

    #[test]
    fn test_deactivate_adapter_is_idempotent() {
        let mut t = table(vec![entry(1, 0, true), entry(2, 0, true), entry(3, 1, true)]);
        assert_eq!(t.deactivate_adapter(AdapterId::new(0)), 2);
        let once = t.clone();
        assert_eq!(t.deactivate_adapter(AdapterId::new(0)), 0);
        assert_eq!(t, once);
        assert_eq!(t.active_count(), 1);
    }

    #[test]
    fn test_deactivate_unknown_adapter_is_noop() {
        let mut t = table(vec![entry(1, 0, true)]);
        assert_eq!(t.deactivate_adapter(AdapterId::new(9)), 0);
        assert_eq!(t.active_count(), 1);
    }

    #[test]
    fn test_deactivate_ignores_entries_without_adapter() {
        let mut t = table(vec![PartitionEntry::new(SlotId::new(5)), entry(1, 0, true)]);
        assert_eq!(t.deactivate_adapter(AdapterId::new(0)), 1);
        assert_eq!(t.get(SlotId::new(5)).unwrap().adapter(), None);
    }
}
