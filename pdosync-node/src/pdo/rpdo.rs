use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};

use critical_section::Mutex;
use defmt_or_log::debug;
use pdosync_common::{
    constants::values::TRANSMISSION_TYPE_SYNC_MAX, messages::MAX_DATA_LENGTH, AtomicCell, CanId,
    CanMessage, NmtState,
};

use super::{resolve_and_report, MappedPdo, MappingError, PdoDirection, PdoParams};
use crate::{error_sink::ErrorSink, object_dict::ODEntry};

/// One receive buffer
///
/// The receive context writes the data and then sets `ready`. The process context clears `ready`
/// and then reads the data.
#[derive(Debug)]
struct RxSlot {
    data: AtomicCell<[u8; MAX_DATA_LENGTH]>,
    ready: AtomicBool,
}

impl RxSlot {
    const fn new() -> Self {
        Self {
            data: AtomicCell::new([0; MAX_DATA_LENGTH]),
            ready: AtomicBool::new(false),
        }
    }

    fn stage(&self, data: [u8; MAX_DATA_LENGTH]) {
        self.data.store(data);
        self.ready.store(true, Ordering::Release);
    }

    fn take(&self) -> Option<[u8; MAX_DATA_LENGTH]> {
        if self.ready.load(Ordering::Acquire) {
            self.ready.store(false, Ordering::SeqCst);
            Some(self.data.load())
        } else {
            None
        }
    }

    fn clear(&self) {
        self.ready.store(false, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// The slot a received frame is staged into
///
/// Asynchronous PDOs only use slot 0.
const fn write_slot(synchronous: bool, toggle: bool) -> usize {
    match (synchronous, toggle) {
        (true, false) => 1,
        _ => 0,
    }
}

/// The slot committed by a tick
///
/// The SYNC toggle flips when a SYNC is received, so at the tick after a SYNC this is the slot
/// which was being written before it arrived.
const fn commit_slot(synchronous: bool, toggle: bool) -> usize {
    write_slot(synchronous, !toggle)
}

#[derive(Clone, Debug)]
struct RpdoState {
    valid: bool,
    synchronous: bool,
    cob_id: Option<CanId>,
    mapping: MappedPdo,
}

impl RpdoState {
    const fn new() -> Self {
        Self {
            valid: false,
            synchronous: false,
            cob_id: None,
            mapping: MappedPdo::new(),
        }
    }
}

/// A receive PDO
///
/// Received frames are double buffered. For a synchronous RPDO (transmission type 0-240) the data
/// received between two SYNCs is applied to the mapped objects at the tick following the second
/// SYNC. An asynchronous RPDO applies received data at the next tick.
#[derive(Debug)]
pub struct Rpdo {
    params: PdoParams,
    state: Mutex<RefCell<RpdoState>>,
    slots: [RxSlot; 2],
}

impl Default for Rpdo {
    fn default() -> Self {
        Self::new()
    }
}

impl Rpdo {
    /// Create a new, invalid, RPDO
    pub const fn new() -> Self {
        Self {
            params: PdoParams::new(),
            state: Mutex::new(RefCell::new(RpdoState::new())),
            slots: [const { RxSlot::new() }; 2],
        }
    }

    /// The stored parameters of this PDO
    pub fn params(&self) -> &PdoParams {
        &self.params
    }

    /// Returns true if the PDO is enabled with a valid identifier and mapping
    pub fn valid(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).valid)
    }

    /// The identifier this PDO is receiving, if it is valid
    pub fn cob_id(&self) -> Option<CanId> {
        critical_section::with(|cs| self.state.borrow_ref(cs).cob_id)
    }

    /// Number of bytes mapped
    pub fn data_len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).mapping.data_len())
    }

    /// Returns true if received data is applied at SYNC
    pub fn is_synchronous(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).synchronous)
    }

    /// Get a copy of the resolved mapping
    pub fn mapping(&self) -> MappedPdo {
        critical_section::with(|cs| self.state.borrow_ref(cs).mapping.clone())
    }

    /// Resolve the first `count` stored mapping parameters and replace the current mapping
    ///
    /// On failure the mapping is cleared, and the failure is reported to `errors`.
    pub fn configure_mapping(
        &self,
        od: &[ODEntry<'static>],
        count: u8,
        errors: &dyn ErrorSink,
    ) -> Result<(), MappingError> {
        let result = resolve_and_report(od, PdoDirection::Receive, &self.params, count, errors);
        let (mapping, result) = match result {
            Ok(mapping) => (mapping, Ok(())),
            Err(e) => (MappedPdo::new(), Err(e)),
        };
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).mapping = mapping);
        result
    }

    /// Apply a COB-ID parameter
    ///
    /// The PDO becomes valid if the COB-ID is enabled, the identifier is allowed, and something is
    /// mapped. Staged data is dropped when the PDO is not valid.
    pub fn configure_communication(&self, cob_id: u32) {
        let id = self.params.effective_id(cob_id, self.data_len());
        let synchronous = self.params.transmission_type() <= TRANSMISSION_TYPE_SYNC_MAX;
        let was_valid = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let was_valid = state.valid;
            state.valid = id.is_some();
            state.cob_id = id.map(CanId::Std);
            state.synchronous = synchronous;
            was_valid
        });
        match id {
            Some(id) => debug!("RPDO enabled on 0x{:x}", id),
            None => {
                self.slots[0].clear();
                self.slots[1].clear();
                if was_valid {
                    debug!("RPDO disabled");
                }
            }
        }
    }

    /// Apply a new transmission type
    pub(crate) fn apply_transmission_type(&self, transmission_type: u8) {
        self.params.set_transmission_type(transmission_type);
        let synchronous = transmission_type <= TRANSMISSION_TYPE_SYNC_MAX;
        let changed = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let changed = state.synchronous != synchronous;
            state.synchronous = synchronous;
            changed
        });
        if changed {
            self.slots[1].clear();
        }
    }

    /// Bring the PDO from its stored parameters into running state
    pub fn reset(&self, od: &[ODEntry<'static>], errors: &dyn ErrorSink) {
        // Failures are reported to the error sink and leave the PDO unmapped
        self.configure_mapping(od, self.params.mapping_count(), errors)
            .ok();
        self.configure_communication(self.params.cob_id());
    }

    /// Stage a received frame
    ///
    /// Called from the receive context. `toggle` is the current SYNC toggle. Returns true if the
    /// frame was accepted.
    pub fn receive(&self, msg: &CanMessage, nmt: NmtState, toggle: bool) -> bool {
        let (valid, synchronous, data_len) = critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            (state.valid, state.synchronous, state.mapping.data_len())
        });
        if !valid || nmt != NmtState::Operational || (msg.dlc as usize) < data_len {
            return false;
        }
        self.slots[write_slot(synchronous, toggle)].stage(msg.data);
        true
    }

    /// Returns true if received data is waiting to be applied
    pub fn has_pending_data(&self) -> bool {
        self.slots.iter().any(|s| s.is_ready())
    }

    /// Apply staged data to the mapped objects
    ///
    /// Called once per tick, after the SYNC processing.
    pub fn process(&self, sync_occurred: bool, toggle: bool, nmt: NmtState) {
        let (valid, synchronous, mapping) = critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            (state.valid, state.synchronous, state.mapping.clone())
        });
        if !valid || nmt != NmtState::Operational {
            self.slots[0].clear();
            self.slots[1].clear();
            return;
        }
        if synchronous && !sync_occurred {
            return;
        }
        let slot = &self.slots[commit_slot(synchronous, toggle)];
        // A frame may be staged again while the previous one is being copied
        while let Some(data) = slot.take() {
            mapping.scatter(&data);
        }
    }
}
