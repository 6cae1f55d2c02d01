//! In-process HSM emulator.
//!
//! [`HsmSimulator`] answers topology queries from an [`HsmProfile`], runs the
//! key-check function module on every send and serves token sessions. Faults
//! can be injected per adapter at load time or while running.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wld_hsm::{
    AdapterId, CkRv, EmbeddedSlotId, FmNumber, HsmState, MdBuffer, MdError, MdReply, MdResult,
    MdStatus, MessageDispatch, ObjectHandle, SessionHandle, SlotId, TokenApi, TokenResult,
};

use crate::error::Result;
use crate::fm_handler;
use crate::profile::{Fault, HsmProfile};

#[derive(Debug, Clone)]
struct AdapterRuntime {
    state: HsmState,
    fault: Fault,
    fail_after: u64,
    /// Sends served without a fault.
    served: u64,
    /// Every send addressed to this adapter.
    sends: u64,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    slot: SlotId,
    logged_in: bool,
}

#[derive(Debug, Default)]
struct SimState {
    adapters: HashMap<AdapterId, AdapterRuntime>,
    sessions: HashMap<SessionHandle, Session>,
    next_session: u64,
}

/// Emulated HSM backend.
#[derive(Debug)]
pub struct HsmSimulator {
    profile: HsmProfile,
    state: Mutex<SimState>,
}

impl HsmSimulator {
    /// Creates an emulator from a validated profile.
    pub fn new(profile: HsmProfile) -> Result<Self> {
        profile.validate()?;

        let adapters = profile
            .adapters
            .iter()
            .map(|a| {
                (
                    a.id,
                    AdapterRuntime {
                        state: a.state,
                        fault: a.fault,
                        fail_after: a.fail_after,
                        served: 0,
                        sends: 0,
                    },
                )
            })
            .collect();

        Ok(Self {
            profile,
            state: Mutex::new(SimState {
                adapters,
                sessions: HashMap::new(),
                next_session: 1,
            }),
        })
    }

    /// Loads a profile file and creates an emulator from it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let profile = HsmProfile::load(path)?;
        Self::new(profile)
    }

    pub fn profile(&self) -> &HsmProfile {
        &self.profile
    }

    /// Makes every later send to `adapter` fail with `fault`.
    ///
    /// Returns false if the adapter is unknown.
    pub fn set_fault(&self, adapter: AdapterId, fault: Fault) -> bool {
        let mut state = self.state.lock();
        match state.adapters.get_mut(&adapter) {
            Some(runtime) => {
                runtime.fault = fault;
                runtime.fail_after = 0;
                info!(adapter = %adapter, fault = ?fault, "Injected adapter fault");
                true
            }
            None => false,
        }
    }

    /// Changes the state an adapter reports.
    ///
    /// Returns false if the adapter is unknown.
    pub fn set_state(&self, adapter: AdapterId, hsm_state: HsmState) -> bool {
        let mut state = self.state.lock();
        match state.adapters.get_mut(&adapter) {
            Some(runtime) => {
                runtime.state = hsm_state;
                true
            }
            None => false,
        }
    }

    /// Number of sends addressed to `adapter`, faulted or not.
    pub fn sends(&self, adapter: AdapterId) -> u64 {
        self.state
            .lock()
            .adapters
            .get(&adapter)
            .map_or(0, |a| a.sends)
    }

    pub fn total_sends(&self) -> u64 {
        self.state.lock().adapters.values().map(|a| a.sends).sum()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    fn find_on_embedded(
        &self,
        adapter: AdapterId,
        embedded_slot: EmbeddedSlotId,
        label: &str,
    ) -> TokenResult<Vec<ObjectHandle>> {
        self.profile
            .embedded(adapter, embedded_slot)
            .map(|slot| slot.find(label))
            .ok_or(CkRv::SLOT_ID_INVALID)
    }

    /// Returns the session if it exists.
    fn session(&self, session: SessionHandle) -> TokenResult<Session> {
        self.state
            .lock()
            .sessions
            .get(&session)
            .copied()
            .ok_or(CkRv::SESSION_HANDLE_INVALID)
    }
}

impl MessageDispatch for HsmSimulator {
    fn initialize(&self) -> MdResult<()> {
        info!(
            adapters = self.profile.adapters.len(),
            slots = self.profile.slots.len(),
            "HSM emulator ready"
        );
        Ok(())
    }

    fn hsm_index_for_slot(&self, slot: SlotId) -> MdResult<AdapterId> {
        self.profile
            .slot(slot)
            .map(|s| s.adapter)
            .ok_or(MdError::from_status(MdStatus::InvalidParameter))
    }

    fn hsm_state(&self, adapter: AdapterId) -> MdResult<HsmState> {
        self.state
            .lock()
            .adapters
            .get(&adapter)
            .map(|a| a.state)
            .ok_or(MdError::adapter(adapter, MdStatus::InvalidHsmIndex))
    }

    fn embedded_slot_for_slot(&self, slot: SlotId) -> MdResult<EmbeddedSlotId> {
        self.profile
            .slot(slot)
            .map(|s| s.embedded_slot)
            .ok_or(MdError::from_status(MdStatus::InvalidParameter))
    }

    fn send_receive(
        &self,
        adapter: AdapterId,
        _originator_id: u32,
        fm_number: FmNumber,
        request: &[MdBuffer],
        _timeout: Duration,
    ) -> MdResult<MdReply> {
        {
            let mut state = self.state.lock();
            let runtime = state
                .adapters
                .get_mut(&adapter)
                .ok_or(MdError::adapter(adapter, MdStatus::InvalidHsmIndex))?;
            runtime.sends += 1;

            if !runtime.state.is_operational() {
                warn!(adapter = %adapter, hsm_state = %runtime.state, "Send to non-operational adapter");
                return Err(MdError::adapter(adapter, MdStatus::Unsuccessful));
            }
            if let Some(status) = runtime.fault.status() {
                if runtime.served >= runtime.fail_after {
                    debug!(adapter = %adapter, status = %status, "Injected fault");
                    return Err(MdError::adapter(adapter, status));
                }
            }
            runtime.served += 1;
        }

        if fm_number != FmNumber::CUSTOM {
            return Err(MdError::adapter(adapter, MdStatus::InvalidParameter));
        }

        let app_status = fm_handler::handle_key_check(request, |embedded, label| {
            self.find_on_embedded(adapter, embedded, label)
        });
        Ok(MdReply::status_only(app_status))
    }
}

impl TokenApi for HsmSimulator {
    fn open_session(&self, slot: SlotId) -> TokenResult<SessionHandle> {
        let profile = self.profile.slot(slot).ok_or(CkRv::SLOT_ID_INVALID)?;

        let mut state = self.state.lock();
        let operational = state
            .adapters
            .get(&profile.adapter)
            .is_some_and(|a| a.state.is_operational());
        if !operational {
            return Err(CkRv::TOKEN_NOT_PRESENT);
        }

        let handle = SessionHandle(state.next_session);
        state.next_session += 1;
        state.sessions.insert(
            handle,
            Session {
                slot,
                logged_in: false,
            },
        );
        Ok(handle)
    }

    fn login(&self, session: SessionHandle, pin: &str) -> TokenResult<()> {
        let mut state = self.state.lock();
        let current = state
            .sessions
            .get_mut(&session)
            .ok_or(CkRv::SESSION_HANDLE_INVALID)?;
        let slot = self
            .profile
            .slot(current.slot)
            .ok_or(CkRv::SLOT_ID_INVALID)?;
        if slot.pin != pin {
            return Err(CkRv::PIN_INCORRECT);
        }

        current.logged_in = true;
        Ok(())
    }

    fn find_objects(&self, session: SessionHandle, label: &str) -> TokenResult<Vec<ObjectHandle>> {
        let current = self.session(session)?;
        if !current.logged_in {
            return Err(CkRv::USER_NOT_LOGGED_IN);
        }
        self.profile
            .slot(current.slot)
            .map(|s| s.find(label))
            .ok_or(CkRv::SLOT_ID_INVALID)
    }

    fn close_session(&self, session: SessionHandle) -> TokenResult<()> {
        self.state
            .lock()
            .sessions
            .remove(&session)
            .map(|_| ())
            .ok_or(CkRv::SESSION_HANDLE_INVALID)
    }
}
