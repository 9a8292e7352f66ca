use core::cell::RefCell;

use critical_section::Mutex;
use defmt_or_log::{debug, warn};
use pdosync_common::{
    constants::values::{
        is_invalid_transmission_type, SYNC_START_MAX, TRANSMISSION_TYPE_EVENT,
        TRANSMISSION_TYPE_EVENT_MFR, TRANSMISSION_TYPE_SYNC_MAX,
    },
    messages::MAX_DATA_LENGTH,
    pdo::CobIdWord,
    traits::{CanSendError, CanSender},
    AtomicCell, CanId, CanMessage, NmtState,
};

use super::{resolve_and_report, MappedPdo, MappingError, PdoDirection, PdoParams};
use crate::{error_sink::ErrorSink, object_dict::ODEntry, sync::SyncState};

/// Sync counter value before the first SYNC after a reconfiguration
const SYNC_COUNTER_UNINIT: u8 = 255;
/// Sync counter value while waiting for the SYNC start value
const SYNC_COUNTER_WAIT_START: u8 = 254;

#[derive(Clone, Debug)]
struct TpdoState {
    valid: bool,
    mapping: MappedPdo,
    /// The most recently sent frame
    frame: CanMessage,
}

impl TpdoState {
    const fn new() -> Self {
        Self {
            valid: false,
            mapping: MappedPdo::new(),
            frame: CanMessage {
                data: [0; MAX_DATA_LENGTH],
                dlc: 0,
                id: CanId::Std(0),
            },
        }
    }
}

/// A transmit PDO
///
/// The transmission type determines when the PDO is sent:
///
/// - 0: At a SYNC, if a send has been requested
/// - 1-240: At every Nth SYNC
/// - 253-255: When requested, or when the event timer expires, limited by the inhibit time
#[derive(Debug)]
pub struct Tpdo {
    params: PdoParams,
    /// Inhibit time in 100us units
    inhibit_time: AtomicCell<u16>,
    /// Event timer period in ms
    event_time: AtomicCell<u16>,
    sync_start: AtomicCell<u8>,
    state: Mutex<RefCell<TpdoState>>,
    sync_counter: AtomicCell<u8>,
    inhibit_timer_us: AtomicCell<u32>,
    event_timer_us: AtomicCell<u32>,
    send_request: AtomicCell<bool>,
}

impl Default for Tpdo {
    fn default() -> Self {
        Self::new()
    }
}

impl Tpdo {
    /// Create a new, invalid, TPDO
    pub const fn new() -> Self {
        Self {
            params: PdoParams::new(),
            inhibit_time: AtomicCell::new(0),
            event_time: AtomicCell::new(0),
            sync_start: AtomicCell::new(0),
            state: Mutex::new(RefCell::new(TpdoState::new())),
            sync_counter: AtomicCell::new(SYNC_COUNTER_UNINIT),
            inhibit_timer_us: AtomicCell::new(0),
            event_timer_us: AtomicCell::new(0),
            send_request: AtomicCell::new(false),
        }
    }

    /// The stored parameters of this PDO
    pub fn params(&self) -> &PdoParams {
        &self.params
    }

    /// The inhibit time parameter, in 100us units
    pub fn inhibit_time(&self) -> u16 {
        self.inhibit_time.load()
    }

    /// Store the inhibit time parameter, in 100us units
    pub fn set_inhibit_time(&self, value: u16) {
        self.inhibit_time.store(value);
    }

    /// The event timer parameter, in ms
    pub fn event_time(&self) -> u16 {
        self.event_time.load()
    }

    /// Store the event timer parameter, in ms
    pub fn set_event_time(&self, value: u16) {
        self.event_time.store(value);
    }

    /// The SYNC start value parameter
    pub fn sync_start(&self) -> u8 {
        self.sync_start.load()
    }

    /// Store the SYNC start value parameter
    pub fn set_sync_start(&self, value: u8) {
        self.sync_start.store(value);
    }

    /// Returns true if the PDO is enabled with a valid identifier and mapping
    pub fn valid(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).valid)
    }

    /// The identifier this PDO is sent with, if it is valid
    pub fn cob_id(&self) -> Option<CanId> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            state.valid.then_some(state.frame.id)
        })
    }

    /// Number of bytes mapped
    pub fn data_len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).mapping.data_len())
    }

    /// Get a copy of the resolved mapping
    pub fn mapping(&self) -> MappedPdo {
        critical_section::with(|cs| self.state.borrow_ref(cs).mapping.clone())
    }

    /// The most recently sent frame
    pub fn last_frame(&self) -> CanMessage {
        critical_section::with(|cs| self.state.borrow_ref(cs).frame)
    }

    /// The current SYNC counter
    pub fn sync_counter(&self) -> u8 {
        self.sync_counter.load()
    }

    /// Request a transmission
    ///
    /// Event driven PDOs are sent at the next tick, subject to the inhibit time. PDOs with
    /// transmission type 0 are sent at the next SYNC.
    pub fn request_send(&self) {
        self.send_request.store(true);
    }

    /// Returns true if a send is pending
    pub fn send_requested(&self) -> bool {
        self.send_request.load()
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
        let result = resolve_and_report(od, PdoDirection::Transmit, &self.params, count, errors);
        let (mapping, result) = match result {
            Ok(mapping) => (mapping, Ok(())),
            Err(e) => (MappedPdo::new(), Err(e)),
        };
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.frame.dlc = mapping.data_len() as u8;
            state.mapping = mapping;
        });
        result
    }

    /// Apply a COB-ID parameter
    ///
    /// The PDO becomes valid if the COB-ID is enabled, the identifier is allowed, and something is
    /// mapped.
    pub fn configure_communication(&self, cob_id: u32) {
        let id = self.params.effective_id(cob_id, self.data_len());
        let was_valid = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let was_valid = state.valid;
            state.valid = id.is_some();
            state.frame.id = CanId::Std(id.unwrap_or(0));
            state.frame.dlc = state.mapping.data_len() as u8;
            was_valid
        });
        match id {
            Some(id) => debug!("TPDO enabled on 0x{:x}", id),
            None if was_valid => debug!("TPDO disabled"),
            None => (),
        }
    }

    /// Apply a new transmission type
    pub(crate) fn apply_transmission_type(&self, transmission_type: u8) {
        self.params.set_transmission_type(transmission_type);
        self.sync_counter.store(SYNC_COUNTER_UNINIT);
    }

    pub(crate) fn apply_cob_id(&self, cob_id: u32) {
        self.params.set_cob_id(cob_id);
        self.configure_communication(cob_id);
        self.sync_counter.store(SYNC_COUNTER_UNINIT);
    }

    pub(crate) fn apply_inhibit_time(&self, value: u16) {
        self.inhibit_time.store(value);
        self.inhibit_timer_us.store(0);
    }

    pub(crate) fn apply_event_time(&self, value: u16) {
        self.event_time.store(value);
        self.event_timer_us.store(value as u32 * 1000);
    }

    /// Bring the PDO from its stored parameters into running state
    pub fn reset(&self, od: &[ODEntry<'static>], errors: &dyn ErrorSink) {
        // Failures are reported to the error sink and leave the PDO unmapped
        self.configure_mapping(od, self.params.mapping_count(), errors)
            .ok();

        let transmission_type = self.params.transmission_type();
        let mut cob_id = self.params.cob_id();
        if is_invalid_transmission_type(transmission_type) || self.sync_start() > SYNC_START_MAX {
            warn!(
                "TPDO has invalid transmission type {} or sync start {}",
                transmission_type,
                self.sync_start()
            );
            cob_id |= CobIdWord::INVALID;
        }
        self.configure_communication(cob_id);

        self.sync_counter.store(SYNC_COUNTER_UNINIT);
        self.inhibit_timer_us.store(0);
        self.event_timer_us.store(self.event_time() as u32 * 1000);
        self.send_request
            .store(transmission_type >= TRANSMISSION_TYPE_EVENT_MFR);
    }

    /// Check whether any mapped byte flagged for change-of-state detection differs from the last
    /// sent frame
    pub fn is_change_of_state(&self) -> bool {
        let (mapping, sent) =
            critical_section::with(|cs| {
                let state = self.state.borrow_ref(cs);
                (state.mapping.clone(), state.frame.data)
            });
        let len = mapping.data_len();
        if len == 0 || mapping.cos_flags() == 0 {
            return false;
        }
        let mut live = [0u8; MAX_DATA_LENGTH];
        mapping.gather(&mut live);
        (0..len)
            .rev()
            .any(|i| live[i] != sent[i] && mapping.cos_flags() & (1 << i) != 0)
    }

    /// Gather the current values of the mapped objects and send the PDO
    ///
    /// This clears any pending request. A full transmit queue is returned to the caller.
    pub fn send(&self, sender: &mut dyn CanSender) -> Result<(), CanSendError> {
        let mapping = self.mapping();
        let mut data = [0u8; MAX_DATA_LENGTH];
        mapping.gather(&mut data);
        let msg = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.frame.data = data;
            state.frame
        });
        self.send_request.store(false);
        if self.params.transmission_type() <= TRANSMISSION_TYPE_SYNC_MAX {
            sender.send_sync_pdo(msg)
        } else {
            sender.send(msg)
        }
    }

    /// Run the transmission state machine for one tick
    ///
    /// `sync_occurred` is true if a SYNC was received or produced in this tick. Returns true if the
    /// PDO was sent.
    pub fn process(
        &self,
        sync: &SyncState,
        sync_occurred: bool,
        elapsed_us: u32,
        nmt: NmtState,
        sender: &mut dyn CanSender,
    ) -> Result<bool, CanSendError> {
        let transmission_type = self.params.transmission_type();
        let mut result = Ok(false);

        if self.valid() && nmt == NmtState::Operational {
            if transmission_type >= TRANSMISSION_TYPE_EVENT {
                if self.event_time() != 0 && self.event_timer_us.load() == 0 {
                    self.send_request.store(true);
                }
                if self.send_request.load() && self.inhibit_timer_us.load() == 0 {
                    result = self.send(sender).map(|_| true);
                    if result.is_ok() {
                        self.inhibit_timer_us
                            .store(self.inhibit_time() as u32 * 100);
                        self.event_timer_us.store(self.event_time() as u32 * 1000);
                    }
                }
            } else if sync_occurred {
                if transmission_type == 0 {
                    if self.send_request.load() {
                        result = self.send(sender).map(|_| true);
                    }
                } else {
                    result = self.process_cyclic(sync, transmission_type, sender);
                }
            }
        } else {
            self.send_request
                .store(transmission_type >= TRANSMISSION_TYPE_EVENT_MFR);
        }

        let _ = self
            .inhibit_timer_us
            .fetch_update(|t| Some(t.saturating_sub(elapsed_us)));
        let _ = self
            .event_timer_us
            .fetch_update(|t| Some(t.saturating_sub(elapsed_us)));

        result
    }

    fn process_cyclic(
        &self,
        sync: &SyncState,
        transmission_type: u8,
        sender: &mut dyn CanSender,
    ) -> Result<bool, CanSendError> {
        let mut counter = self.sync_counter.load();
        if counter == SYNC_COUNTER_UNINIT {
            counter = if sync.counter_overflow() != 0 && self.sync_start() != 0 {
                SYNC_COUNTER_WAIT_START
            } else {
                transmission_type
            };
        }

        let send = if counter == SYNC_COUNTER_WAIT_START {
            if sync.counter() == self.sync_start() {
                counter = transmission_type;
                true
            } else {
                false
            }
        } else {
            counter = counter.saturating_sub(1);
            if counter == 0 {
                counter = transmission_type;
                true
            } else {
                false
            }
        };
        self.sync_counter.store(counter);

        if send {
            self.send(sender).map(|_| true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use pdosync_common::{
        messages::SyncObject,
        objects::{PdoMapping, SubInfo},
    };

    use super::*;
    use crate::{error_sink::ErrorStatus, object_dict::VarObject};

    const TX_INFO: SubInfo = SubInfo::new_u8().rw_access().pdo_mapping(PdoMapping::Tpdo);

    static VALUE_A: VarObject<u8> = VarObject::new(0x11, TX_INFO);
    static VALUE_B: VarObject<u8> = VarObject::new(0x22, TX_INFO);
    static VALUE_COS: VarObject<u16> = VarObject::new(
        0,
        SubInfo::new_u16()
            .rw_access()
            .pdo_mapping(PdoMapping::Tpdo)
            .detect_cos(true),
    );

    static VALUE_C: VarObject<u8> = VarObject::new(0x44, TX_INFO);

    static OD: [ODEntry<'static>; 4] = [
        ODEntry {
            index: 0x2000,
            data: &VALUE_A,
        },
        ODEntry {
            index: 0x2001,
            data: &VALUE_B,
        },
        ODEntry {
            index: 0x2002,
            data: &VALUE_COS,
        },
        ODEntry {
            index: 0x2003,
            data: &VALUE_C,
        },
    ];

    fn make_tpdo(mapping: &[u32], transmission_type: u8) -> Tpdo {
        let tpdo = Tpdo::new();
        tpdo.params().set_identity(0x180, 1);
        tpdo.params().set_cob_id(0x181);
        tpdo.params().set_transmission_type(transmission_type);
        tpdo.params().set_mappings(mapping);
        tpdo.reset(&OD, &ErrorStatus::new());
        tpdo
    }

    fn sync_with_counter(overflow: u8) -> SyncState {
        let sync = SyncState::new();
        sync.set_counter_overflow(overflow);
        sync.reset();
        sync
    }

    /// Run the ticks, returning how many frames were sent
    fn run(
        tpdo: &Tpdo,
        sync: &SyncState,
        ticks: &[(bool, u32)],
        sent: &mut Vec<CanMessage>,
    ) -> usize {
        let start = sent.len();
        let mut sender = |msg: CanMessage| -> Result<(), CanSendError> {
            sent.push(msg);
            Ok(())
        };
        for (sync_occurred, elapsed) in ticks {
            tpdo.process(sync, *sync_occurred, *elapsed, NmtState::Operational, &mut sender)
                .unwrap();
        }
        sent.len() - start
    }

    #[test]
    fn test_no_send_without_trigger() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();
        for tt in [0, 1, 240] {
            let tpdo = make_tpdo(&[0x2000_0008], tt);
            assert!(tpdo.valid());
            assert_eq!(0, run(&tpdo, &sync, &[(false, 0); 3], &mut sent));
        }
    }

    #[test]
    fn test_cyclic_sync() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();

        let tpdo = make_tpdo(&[0x2000_0008, 0x2001_0008], 1);
        assert_eq!(3, run(&tpdo, &sync, &[(true, 0); 3], &mut sent));
        assert_eq!(CanId::Std(0x181), sent[0].id);
        assert_eq!(&[0x11, 0x22], sent[0].data());

        // Every third SYNC, counted from the first one seen
        let tpdo = make_tpdo(&[0x2000_0008], 3);
        assert_eq!(0, run(&tpdo, &sync, &[(true, 0); 2], &mut sent));
        assert_eq!(1, run(&tpdo, &sync, &[(true, 0)], &mut sent));
        assert_eq!(0, run(&tpdo, &sync, &[(true, 0); 2], &mut sent));
        assert_eq!(1, run(&tpdo, &sync, &[(true, 0)], &mut sent));

        let tpdo = make_tpdo(&[0x2000_0008], 240);
        for _ in 0..2 {
            assert_eq!(0, run(&tpdo, &sync, &[(true, 0); 239], &mut sent));
            assert_eq!(1, run(&tpdo, &sync, &[(true, 0)], &mut sent));
        }
    }

    #[test]
    fn test_acyclic_sync_sends_on_request() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();
        let tpdo = make_tpdo(&[0x2000_0008], 0);
        tpdo.request_send();
        assert_eq!(0, run(&tpdo, &sync, &[(false, 100)], &mut sent));
        assert_eq!(1, run(&tpdo, &sync, &[(true, 0)], &mut sent));
        assert!(!tpdo.send_requested());
        assert_eq!(0, run(&tpdo, &sync, &[(true, 0)], &mut sent));
    }

    #[test]
    fn test_sync_start_value() {
        let sync = sync_with_counter(10);
        let mut sent = Vec::new();
        let tpdo = make_tpdo(&[0x2000_0008], 1);
        tpdo.set_sync_start(5);
        tpdo.reset(&OD, &ErrorStatus::new());

        let mut sends = Vec::new();
        for counter in [3, 4, 5, 6, 7] {
            let msg = SyncObject::new(Some(counter)).to_can_message(CanId::Std(0x80));
            assert!(sync.receive(&msg, NmtState::Operational));
            sends.push(run(&tpdo, &sync, &[(true, 0)], &mut sent));
        }
        assert_eq!(vec![0, 0, 1, 1, 1], sends);
    }

    #[test]
    fn test_event_driven_inhibit_and_event_timer() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();
        let tpdo = make_tpdo(&[0x2000_0008], 254);
        tpdo.set_inhibit_time(10); // 1ms
        tpdo.set_event_time(5); // 5ms
        tpdo.reset(&OD, &ErrorStatus::new());

        // Initial request is set for type 254
        assert!(tpdo.send_requested());
        assert_eq!(1, run(&tpdo, &sync, &[(false, 100)], &mut sent));

        // Inhibited for 1ms
        tpdo.request_send();
        assert_eq!(0, run(&tpdo, &sync, &[(false, 500)], &mut sent));
        assert_eq!(1, run(&tpdo, &sync, &[(false, 500), (false, 0)], &mut sent));

        // Event timer expires 5ms after the last send
        assert_eq!(0, run(&tpdo, &sync, &[(false, 4000)], &mut sent));
        assert_eq!(1, run(&tpdo, &sync, &[(false, 1000), (false, 0)], &mut sent));

        // SYNC doesn't trigger an event driven PDO
        assert_eq!(0, run(&tpdo, &sync, &[(true, 0)], &mut sent));
    }

    #[test]
    fn test_type_253_is_invalid() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();
        let tpdo = make_tpdo(&[0x2000_0008], 253);
        assert!(!tpdo.valid());
        tpdo.request_send();
        assert_eq!(0, run(&tpdo, &sync, &[(true, 1000), (false, 1000)], &mut sent));

        // The neighbouring event driven type is accepted
        let tpdo = make_tpdo(&[0x2000_0008], 254);
        assert!(tpdo.valid());
        assert_eq!(1, run(&tpdo, &sync, &[(false, 0)], &mut sent));
    }

    #[test]
    fn test_invalid_or_stopped_forces_request() {
        let sync = sync_with_counter(0);
        let tpdo = make_tpdo(&[0x2000_0008], 255);
        let mut sender = |_msg: CanMessage| -> Result<(), CanSendError> { Ok(()) };
        tpdo.process(&sync, false, 0, NmtState::Operational, &mut sender)
            .unwrap();
        assert!(!tpdo.send_requested());
        tpdo.process(&sync, false, 0, NmtState::PreOperational, &mut sender)
            .unwrap();
        assert!(tpdo.send_requested());

        let tpdo = make_tpdo(&[0x2000_0008], 1);
        tpdo.request_send();
        tpdo.process(&sync, false, 0, NmtState::Stopped, &mut sender)
            .unwrap();
        assert!(!tpdo.send_requested());
    }

    #[test]
    fn test_invalid_transmission_type_at_reset() {
        let tpdo = make_tpdo(&[0x2000_0008], 241);
        assert!(!tpdo.valid());
        let tpdo = make_tpdo(&[0x2000_0008], 1);
        tpdo.set_sync_start(241);
        tpdo.reset(&OD, &ErrorStatus::new());
        assert!(!tpdo.valid());
    }

    #[test]
    fn test_change_of_state() {
        let sync = sync_with_counter(0);
        let mut sent = Vec::new();
        let tpdo = make_tpdo(&[0x2003_0008, 0x2002_0010], 255);
        assert_eq!(0b110, tpdo.mapping().cos_flags());
        // Initial send after reset
        assert_eq!(1, run(&tpdo, &sync, &[(false, 0)], &mut sent));
        assert!(!tpdo.is_change_of_state());
        assert_eq!(0, run(&tpdo, &sync, &[(false, 0)], &mut sent));

        VALUE_COS.store(0x0100);
        assert!(tpdo.is_change_of_state());
        tpdo.request_send();
        assert_eq!(1, run(&tpdo, &sync, &[(false, 0)], &mut sent));
        assert!(!tpdo.is_change_of_state());

        // Not flagged for change of state
        VALUE_C.store(0x33);
        assert!(!tpdo.is_change_of_state());
    }

    #[test]
    fn test_overflow_is_returned() {
        let sync = sync_with_counter(0);
        let tpdo = make_tpdo(&[0x2001_0008], 254);
        let mut sender = |msg: CanMessage| -> Result<(), CanSendError> { Err(CanSendError(msg)) };
        let result = tpdo.process(&sync, false, 0, NmtState::Operational, &mut sender);
        assert!(matches!(result, Err(CanSendError(msg)) if msg.id == CanId::Std(0x181)));
        // The request is not retried
        assert!(!tpdo.send_requested());
    }
}
