//! Scriptable [`MessageDispatch`] used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use wld_hsm::{
    AdapterId, EmbeddedSlotId, FmNumber, HsmState, MdBuffer, MdError, MdReply, MdResult,
    MdStatus, MessageDispatch, SlotId,
};

use crate::router::WldRouter;

#[derive(Default)]
pub(crate) struct FakeDispatch {
    topology: HashMap<SlotId, (AdapterId, EmbeddedSlotId)>,
    states: HashMap<AdapterId, MdResult<HsmState>>,
    embedded_failures: HashSet<SlotId>,
    send_failures: Mutex<HashMap<AdapterId, MdStatus>>,
    app_status: Mutex<u32>,
    sent: Mutex<Vec<AdapterId>>,
}

impl FakeDispatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slot(mut self, slot: u32, adapter: u32, embedded: u32) -> Self {
        self.topology.insert(
            SlotId::new(slot),
            (AdapterId::new(adapter), EmbeddedSlotId::new(embedded)),
        );
        self
    }

    pub(crate) fn adapter_state(mut self, adapter: u32, state: HsmState) -> Self {
        self.states.insert(AdapterId::new(adapter), Ok(state));
        self
    }

    pub(crate) fn adapter_state_error(mut self, adapter: u32, status: MdStatus) -> Self {
        let adapter = AdapterId::new(adapter);
        self.states.insert(adapter, Err(MdError::adapter(adapter, status)));
        self
    }

    pub(crate) fn embedded_failure(mut self, slot: u32) -> Self {
        self.embedded_failures.insert(SlotId::new(slot));
        self
    }

    /// Makes every later send to `adapter` fail with `status`.
    pub(crate) fn fail_adapter(&self, adapter: u32, status: MdStatus) {
        self.send_failures
            .lock()
            .unwrap()
            .insert(AdapterId::new(adapter), status);
    }

    pub(crate) fn reply_status(&self, status: u32) {
        *self.app_status.lock().unwrap() = status;
    }

    /// Adapters addressed by send_receive, in call order.
    pub(crate) fn sent(&self) -> Vec<AdapterId> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageDispatch for FakeDispatch {
    fn hsm_index_for_slot(&self, slot: SlotId) -> MdResult<AdapterId> {
        self.topology
            .get(&slot)
            .map(|(adapter, _)| *adapter)
            .ok_or(MdError::from_status(MdStatus::InvalidParameter))
    }

    fn hsm_state(&self, adapter: AdapterId) -> MdResult<HsmState> {
        self.states
            .get(&adapter)
            .cloned()
            .unwrap_or(Ok(HsmState::NormalOperation))
    }

    fn embedded_slot_for_slot(&self, slot: SlotId) -> MdResult<EmbeddedSlotId> {
        if self.embedded_failures.contains(&slot) {
            return Err(MdError::from_status(MdStatus::InvalidParameter));
        }
        self.topology
            .get(&slot)
            .map(|(_, embedded)| *embedded)
            .ok_or(MdError::from_status(MdStatus::InvalidParameter))
    }

    fn send_receive(
        &self,
        adapter: AdapterId,
        _originator_id: u32,
        _fm_number: FmNumber,
        _request: &[MdBuffer],
        _timeout: Duration,
    ) -> MdResult<MdReply> {
        self.sent.lock().unwrap().push(adapter);
        if let Some(status) = self.send_failures.lock().unwrap().get(&adapter) {
            return Err(MdError::adapter(adapter, *status));
        }
        Ok(MdReply::status_only(*self.app_status.lock().unwrap()))
    }
}

/// Backend that calls back into its own router from inside every topology
/// lookup and send. Deadlocks if the router holds its lock across a call.
pub(crate) struct ReentrantDispatch {
    inner: FakeDispatch,
    router: OnceLock<Weak<WldRouter>>,
    topology_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl ReentrantDispatch {
    pub(crate) fn new(inner: FakeDispatch) -> Self {
        Self {
            inner,
            router: OnceLock::new(),
            topology_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn attach(&self, router: &Arc<WldRouter>) {
        let _ = self.router.set(Arc::downgrade(router));
    }

    pub(crate) fn inner(&self) -> &FakeDispatch {
        &self.inner
    }

    /// Topology lookups and sends that reached the router from inside.
    pub(crate) fn calls(&self) -> (usize, usize) {
        (
            self.topology_calls.load(Ordering::SeqCst),
            self.send_calls.load(Ordering::SeqCst),
        )
    }

    fn router(&self) -> Option<Arc<WldRouter>> {
        self.router.get().and_then(Weak::upgrade)
    }
}

impl MessageDispatch for ReentrantDispatch {
    fn hsm_index_for_slot(&self, slot: SlotId) -> MdResult<AdapterId> {
        if let Some(router) = self.router() {
            let _ = router.is_initialized();
            let _ = router.partition_count();
            self.topology_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.hsm_index_for_slot(slot)
    }

    fn hsm_state(&self, adapter: AdapterId) -> MdResult<HsmState> {
        self.inner.hsm_state(adapter)
    }

    fn embedded_slot_for_slot(&self, slot: SlotId) -> MdResult<EmbeddedSlotId> {
        self.inner.embedded_slot_for_slot(slot)
    }

    fn send_receive(
        &self,
        adapter: AdapterId,
        originator_id: u32,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
    ) -> MdResult<MdReply> {
        if let Some(router) = self.router() {
            let _ = router.active_count();
            let _ = router.next_slot();
            self.send_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.inner
            .send_receive(adapter, originator_id, fm_number, request, timeout)
    }
}
