//! Send-with-failover.

use std::time::Duration;

use tracing::{debug, warn};
use wld_hsm::{AdapterId, FmNumber, MdBuffer, SlotId};

use crate::error::{WldError, WldResult};
use crate::router::WldRouter;

/// Where a request may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    /// Any active slot; the router picks one and fails over on transient errors.
    Any,
    /// A caller-pinned slot. Never retried.
    Slot(SlotId),
}

impl From<SlotId> for SlotTarget {
    fn from(slot: SlotId) -> Self {
        if slot.is_wildcard() {
            SlotTarget::Any
        } else {
            SlotTarget::Slot(slot)
        }
    }
}

/// Reply to a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmReply {
    /// Response payload written by the function module.
    pub payload: Vec<u8>,
    /// Application status word from the function module (0 = success).
    pub app_status: u32,
    /// Slot the request was finally sent to.
    pub slot: SlotId,
    /// Adapter that served it.
    pub adapter: AdapterId,
    /// Number of transport calls the send made.
    pub attempts: usize,
}

impl FmReply {
    pub fn is_app_ok(&self) -> bool {
        self.app_status == 0
    }
}

impl WldRouter {
    /// Sends `request` to function module `fm_number`.
    ///
    /// A pinned slot gets exactly one transport call. With [`SlotTarget::Any`]
    /// the router selects slots round-robin; a transient failure (adapter
    /// unreachable or internally failed) marks that adapter's slots inactive
    /// and the request moves on to another slot. Any other transport status is
    /// returned as [`WldError::Transport`] without retrying.
    ///
    /// A non-zero application status is not an error at this level; it is
    /// returned in [`FmReply::app_status`].
    ///
    /// `timeout` is passed through untouched; zero means the dispatch layer's
    /// default.
    pub fn send(
        &self,
        target: impl Into<SlotTarget>,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
    ) -> WldResult<FmReply> {
        match target.into() {
            SlotTarget::Slot(slot) => self.send_pinned(slot, fm_number, request, timeout),
            SlotTarget::Any => self.send_any(fm_number, request, timeout),
        }
    }

    fn send_pinned(
        &self,
        slot: SlotId,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
    ) -> WldResult<FmReply> {
        let adapter = self.resolve_adapter(slot);
        self.transmit(slot, adapter, fm_number, request, timeout, 1)
    }

    fn send_any(
        &self,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
    ) -> WldResult<FmReply> {
        // Each failed adapter takes at least one slot out of rotation, so the
        // loop ends by itself; the bound guards against a misbehaving backend.
        let max_attempts = self.partition_count().max(1);
        let mut attempts = 0;

        loop {
            let selection = match self.select() {
                Ok(selection) => selection,
                Err(WldError::NoSlotAvailable) if attempts > 0 => {
                    return Err(self.exhausted(attempts));
                }
                Err(e) => return Err(e),
            };

            if attempts > 0 {
                self.stats.record_failover();
                debug!(slot = %selection.slot, adapter = %selection.adapter, attempts, "Failing over to another slot");
            }
            attempts += 1;

            match self.transmit(
                selection.slot,
                selection.adapter,
                fm_number,
                request,
                timeout,
                attempts,
            ) {
                Err(WldError::Transport { status, .. }) if status.is_transient() => {
                    if attempts >= max_attempts {
                        return Err(self.exhausted(attempts));
                    }
                }
                result => return result,
            }
        }
    }

    /// One transport call. Transient failures mark the adapter unhealthy.
    fn transmit(
        &self,
        slot: SlotId,
        adapter: AdapterId,
        fm_number: FmNumber,
        request: &[MdBuffer],
        timeout: Duration,
        attempts: usize,
    ) -> WldResult<FmReply> {
        self.stats.record_send();

        let result = self.dispatch.send_receive(
            adapter,
            self.config.originator_id,
            fm_number,
            request,
            timeout,
        );

        match result {
            Ok(reply) => {
                self.stats.record_success();
                debug!(slot = %slot, adapter = %adapter, fm = %fm_number, app_status = reply.app_status, "FM request sent");
                Ok(FmReply {
                    payload: reply.payload,
                    app_status: reply.app_status,
                    slot,
                    adapter,
                    attempts,
                })
            }
            Err(e) => {
                let status = e.status();
                if status.is_transient() {
                    self.stats.record_transient_failure();
                    warn!(slot = %slot, adapter = %adapter, status = %status, "Transient transport failure, marking adapter inactive");
                    self.mark_adapter_unhealthy(adapter);
                } else {
                    warn!(slot = %slot, adapter = %adapter, status = %status, "MD send/receive failed");
                }
                Err(WldError::Transport { adapter, status })
            }
        }
    }

    fn exhausted(&self, attempts: usize) -> WldError {
        self.stats.record_exhausted();
        warn!(attempts, "All adapters exhausted");
        WldError::AllAdaptersExhausted { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WldConfig;
    use crate::stats::WldStats;
    use crate::test_support::{FakeDispatch, ReentrantDispatch};
    use pretty_assertions::assert_eq;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use wld_hsm::{EmbeddedSlotId, MdStatus};

    const FM: FmNumber = FmNumber::CUSTOM;

    fn request() -> Vec<MdBuffer> {
        wld_hsm::fm::encode_key_check(EmbeddedSlotId::new(1), 5.into())
    }

    /// Adapter 0 hosts slots 1 and 2, adapter 1 hosts slot 3.
    fn setup() -> (Arc<FakeDispatch>, WldRouter) {
        let backend = Arc::new(
            FakeDispatch::new()
                .slot(1, 0, 11)
                .slot(2, 0, 12)
                .slot(3, 1, 13),
        );
        let router = WldRouter::new(backend.clone(), WldConfig::default());
        let slots: Vec<SlotId> = [1, 2, 3].into_iter().map(SlotId::new).collect();
        router.initialize(Some(&slots)).unwrap();
        (backend, router)
    }

    #[test]
    fn test_slot_target_from_slot_id() {
        assert_eq!(SlotTarget::from(SlotId::WILDCARD), SlotTarget::Any);
        assert_eq!(
            SlotTarget::from(SlotId::new(4)),
            SlotTarget::Slot(SlotId::new(4))
        );
    }

    #[test]
    fn test_wildcard_send_success() {
        let (backend, router) = setup();
        let reply = router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).unwrap();

        assert_eq!(reply.slot, SlotId::new(1));
        assert_eq!(reply.adapter, AdapterId::new(0));
        assert_eq!(reply.attempts, 1);
        assert!(reply.is_app_ok());
        assert_eq!(backend.sent(), vec![AdapterId::new(0)]);
    }

    #[test]
    fn test_wildcard_sends_rotate() {
        let (backend, router) = setup();
        for _ in 0..3 {
            router.send(SlotId::WILDCARD, FM, &request(), Duration::ZERO).unwrap();
        }
        assert_eq!(
            backend.sent(),
            vec![AdapterId::new(0), AdapterId::new(0), AdapterId::new(1)]
        );
    }

    #[test]
    fn test_wildcard_fails_over_to_other_adapter() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::Unsuccessful);

        let reply = router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).unwrap();
        assert_eq!(reply.slot, SlotId::new(3));
        assert_eq!(reply.attempts, 2);
        assert_eq!(backend.sent(), vec![AdapterId::new(0), AdapterId::new(1)]);

        let active: Vec<bool> = router.partitions().iter().map(|e| e.is_active()).collect();
        assert_eq!(active, vec![false, false, true]);
    }

    #[test]
    fn test_wildcard_exhausts_without_third_attempt() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::Unsuccessful);
        backend.fail_adapter(1, MdStatus::InternalError);

        let err = router
            .send(SlotTarget::Any, FM, &request(), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, WldError::AllAdaptersExhausted { attempts: 2 }));
        assert_eq!(backend.sent().len(), 2);
        assert_eq!(router.active_count(), 0);

        // Later wildcard sends see the selector's own exhaustion
        assert!(matches!(
            router.send(SlotTarget::Any, FM, &request(), Duration::ZERO),
            Err(WldError::NoSlotAvailable)
        ));
        assert_eq!(backend.sent().len(), 2);
    }

    #[test]
    fn test_non_transient_error_is_not_retried() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::InvalidParameter);

        let err = router
            .send(SlotTarget::Any, FM, &request(), Duration::ZERO)
            .unwrap_err();
        assert_eq!(err.transport_status(), Some(MdStatus::InvalidParameter));
        assert_eq!(backend.sent().len(), 1);
        assert_eq!(router.active_count(), 3);
    }

    #[test]
    fn test_timeout_is_not_a_health_signal() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::Timeout);

        assert!(router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).is_err());
        assert_eq!(router.active_count(), 3);
    }

    #[test]
    fn test_pinned_send_is_not_retried_but_marks_adapter() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::Unsuccessful);

        let err = router
            .send(SlotId::new(2), FM, &request(), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            WldError::Transport { status: MdStatus::Unsuccessful, .. }
        ));
        assert_eq!(backend.sent(), vec![AdapterId::new(0)]);
        assert_eq!(router.next_slot().unwrap().0, SlotId::new(3));
    }

    #[test]
    fn test_pinned_send_to_inactive_slot_still_goes_out() {
        let (backend, router) = setup();
        router.mark_adapter_unhealthy(AdapterId::new(1));

        let reply = router.send(SlotId::new(3), FM, &request(), Duration::ZERO).unwrap();
        assert_eq!(reply.adapter, AdapterId::new(1));
        assert_eq!(backend.sent(), vec![AdapterId::new(1)]);
    }

    #[test]
    fn test_pinned_unknown_slot_uses_default_adapter() {
        let (backend, router) = setup();
        let reply = router.send(SlotId::new(77), FM, &request(), Duration::ZERO).unwrap();
        assert_eq!(reply.adapter, AdapterId::new(3));
        assert_eq!(backend.sent(), vec![AdapterId::new(3)]);
    }

    #[test]
    fn test_wildcard_before_initialize() {
        let router = WldRouter::new(Arc::new(FakeDispatch::new()), WldConfig::default());
        assert!(matches!(
            router.send(SlotTarget::Any, FM, &request(), Duration::ZERO),
            Err(WldError::NotInitialized)
        ));
    }

    #[test]
    fn test_app_status_is_returned_not_raised() {
        let (backend, router) = setup();
        backend.reply_status(0x82);

        let reply = router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).unwrap();
        assert_eq!(reply.app_status, 0x82);
        assert!(!reply.is_app_ok());
    }

    #[test]
    fn test_stats() {
        let (backend, router) = setup();
        backend.fail_adapter(0, MdStatus::Unsuccessful);
        router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).unwrap();
        backend.fail_adapter(1, MdStatus::Unsuccessful);
        let _ = router.send(SlotTarget::Any, FM, &request(), Duration::ZERO);

        assert_eq!(
            router.stats(),
            WldStats {
                sends: 3,
                successes: 1,
                transient_failures: 2,
                failovers: 1,
                exhausted: 1,
            }
        );
    }

    #[test]
    fn test_backend_calls_run_without_router_lock() {
        let backend = Arc::new(ReentrantDispatch::new(
            FakeDispatch::new()
                .slot(1, 0, 11)
                .slot(2, 0, 12)
                .slot(3, 1, 13),
        ));
        backend.inner().fail_adapter(0, MdStatus::Unsuccessful);
        let router = Arc::new(WldRouter::new(backend.clone(), WldConfig::default()));
        backend.attach(&router);

        let (tx, rx) = mpsc::channel();
        let worker = {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let slots: Vec<SlotId> = [1, 2, 3].into_iter().map(SlotId::new).collect();
                let active = router.initialize(Some(&slots)).unwrap();
                let wildcard = router.send(SlotTarget::Any, FM, &request(), Duration::ZERO).unwrap();
                let pinned = router.send(SlotId::new(77), FM, &request(), Duration::ZERO).unwrap();
                let _ = tx.send((active, wildcard.slot, wildcard.attempts, pinned.adapter));
            })
        };

        // A router that holds its lock across a backend call never answers
        let (active, slot, attempts, adapter) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("router deadlocked on a re-entrant backend");
        worker.join().unwrap();

        assert_eq!(active, 3);
        assert_eq!(slot, SlotId::new(3));
        assert_eq!(attempts, 2);
        assert_eq!(adapter, AdapterId::new(3));
        assert_eq!(backend.calls(), (3, 3));
        assert_eq!(router.active_count(), 1);
    }
}
