//! SYNC producer and consumer
//!
//! The SYNC object is the common time base for synchronous PDOs. A node is either the single
//! producer of the SYNC on the network, or a consumer. Every tick, [`SyncState::process`] returns a
//! [`SyncEvent`] telling the PDOs whether a SYNC occurred.
//!
//! The SYNC parameters are exposed in the object dictionary via [`SyncParamObject`]:
//!
//! - 0x1005: COB-ID SYNC. Bit 30 selects the producer role.
//! - 0x1006: Communication cycle period, in us
//! - 0x1007: Synchronous window length, in us
//! - 0x1019: Synchronous counter overflow value

use defmt_or_log::info;
use pdosync_common::{
    constants::values::DEFAULT_SYNC_ID,
    messages::SyncObject,
    objects::{ObjectCode, SubInfo},
    pdo::CobIdWord,
    sdo::AbortCode,
    traits::CanSender,
    AtomicCell, CanId, CanMessage, NmtState,
};

use crate::{
    error_sink::{emergency_codes, ErrorKind, ErrorSink},
    node_state::NodeStateAccess,
    object_dict::{read_value_bytes, u32_from_data, u8_from_data, ObjectAccess},
};

/// The outcome of a SYNC tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncEvent {
    /// Nothing happened
    None,
    /// A SYNC was received or produced
    Sync,
    /// The synchronous window expired since the last SYNC
    WindowViolated,
}

/// Compute the SYNC timeout for a communication cycle period
///
/// The timeout is 1.5 periods, saturated to `u32::MAX`.
pub const fn sync_timeout(period_us: u32) -> u32 {
    let timeout = (period_us / 2).wrapping_mul(3);
    if timeout < period_us {
        u32::MAX
    } else {
        timeout
    }
}

/// The parameters and run time state of the SYNC object
#[derive(Debug)]
pub struct SyncState {
    /// Stored value of object 0x1005
    cob_id: AtomicCell<u32>,
    period_us: AtomicCell<u32>,
    window_us: AtomicCell<u32>,
    counter_overflow: AtomicCell<u8>,
    producer: AtomicCell<bool>,
    timeout_us: AtomicCell<u32>,
    counter: AtomicCell<u8>,
    timer_us: AtomicCell<u32>,
    rx_new: AtomicCell<bool>,
    toggle: AtomicCell<bool>,
    inside_window: AtomicCell<bool>,
    receive_error: AtomicCell<u16>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// Create a new SYNC consumer on the default identifier
    pub const fn new() -> Self {
        Self {
            cob_id: AtomicCell::new(DEFAULT_SYNC_ID as u32),
            period_us: AtomicCell::new(0),
            window_us: AtomicCell::new(0),
            counter_overflow: AtomicCell::new(0),
            producer: AtomicCell::new(false),
            timeout_us: AtomicCell::new(0),
            counter: AtomicCell::new(0),
            timer_us: AtomicCell::new(0),
            rx_new: AtomicCell::new(false),
            toggle: AtomicCell::new(false),
            inside_window: AtomicCell::new(true),
            receive_error: AtomicCell::new(0),
        }
    }

    /// The stored COB-ID SYNC value
    pub fn cob_id_param(&self) -> u32 {
        self.cob_id.load()
    }

    /// Store the COB-ID SYNC value, to be applied at the next reset
    pub fn set_cob_id_param(&self, value: u32) {
        self.cob_id.store(value);
    }

    /// The identifier of the SYNC message
    pub fn cob_id(&self) -> CanId {
        CanId::Std(CobIdWord(self.cob_id.load()).std_id())
    }

    /// The communication cycle period in us
    pub fn period(&self) -> u32 {
        self.period_us.load()
    }

    /// Store the communication cycle period, to be applied at the next reset
    pub fn set_period(&self, value: u32) {
        self.period_us.store(value);
    }

    /// The synchronous window length in us
    pub fn window(&self) -> u32 {
        self.window_us.load()
    }

    /// Set the synchronous window length in us
    pub fn set_window(&self, value: u32) {
        self.window_us.store(value);
    }

    /// The counter overflow value, or 0 if the SYNC carries no counter
    pub fn counter_overflow(&self) -> u8 {
        self.counter_overflow.load()
    }

    /// Store the counter overflow value, to be applied at the next reset
    pub fn set_counter_overflow(&self, value: u8) {
        self.counter_overflow.store(value);
    }

    /// Returns true if this node produces the SYNC
    pub fn is_producer(&self) -> bool {
        self.producer.load()
    }

    /// The SYNC timeout in us
    pub fn timeout(&self) -> u32 {
        self.timeout_us.load()
    }

    /// The current SYNC counter
    pub fn counter(&self) -> u8 {
        self.counter.load()
    }

    /// Time since the last SYNC in us
    pub fn timer(&self) -> u32 {
        self.timer_us.load()
    }

    /// The toggle bit, which flips at every SYNC
    pub fn toggle(&self) -> bool {
        self.toggle.load()
    }

    /// The pending receive error, if a malformed SYNC was received since the last tick
    ///
    /// The value is the received DLC, or'd with 0x100 when no counter was expected and 0x200
    /// otherwise.
    pub fn receive_error(&self) -> u16 {
        self.receive_error.load()
    }

    /// Bring the SYNC object from its stored parameters into running state
    pub fn reset(&self) {
        let producer = CobIdWord(self.cob_id.load()).bit30();
        self.producer.store(producer);
        self.timeout_us.store(sync_timeout(self.period()));
        self.counter.store(0);
        self.timer_us.store(0);
        self.rx_new.store(false);
        self.toggle.store(false);
        self.inside_window.store(true);
        self.receive_error.store(0);
    }

    fn flip_toggle(&self) {
        let _ = self.toggle.fetch_update(|t| Some(!t));
    }

    /// Handle a received SYNC message
    ///
    /// Called from the receive context. Returns true if the SYNC was accepted.
    pub fn receive(&self, msg: &CanMessage, nmt: NmtState) -> bool {
        if !nmt.sync_active() {
            return false;
        }
        let overflow = self.counter_overflow();
        match SyncObject::from_can_message(msg, overflow) {
            Ok(sync) => {
                if let Some(counter) = sync.counter {
                    self.counter.store(counter);
                }
                self.rx_new.store(true);
                self.flip_toggle();
                true
            }
            Err(_) => {
                let flag = if overflow == 0 { 0x100 } else { 0x200 };
                self.receive_error.store(msg.dlc as u16 | flag);
                false
            }
        }
    }

    /// Advance the SYNC timer by `elapsed_us`, producing a SYNC if this node is the producer
    pub fn process(
        &self,
        elapsed_us: u32,
        nmt: NmtState,
        sender: &mut dyn CanSender,
        errors: &dyn ErrorSink,
    ) -> SyncEvent {
        let mut event = SyncEvent::None;

        if nmt.sync_active() {
            let mut timer = self.timer_us.load().saturating_add(elapsed_us);

            if self.rx_new.swap(false) {
                timer = 0;
                event = SyncEvent::Sync;
            }

            let period = self.period();
            if self.is_producer() && period != 0 && timer >= period {
                let overflow = self.counter_overflow();
                let mut counter = self.counter().wrapping_add(1);
                if counter > overflow {
                    counter = 1;
                }
                self.counter.store(counter);
                timer = 0;
                event = SyncEvent::Sync;
                self.flip_toggle();

                let msg = SyncObject::new((overflow != 0).then_some(counter))
                    .to_can_message(self.cob_id());
                if sender.send(msg).is_err() {
                    errors.report(
                        ErrorKind::CanTxOverflow,
                        emergency_codes::CAN_OVERRUN,
                        msg.id.raw(),
                    );
                }
            }
            self.timer_us.store(timer);

            let window = self.window();
            if window != 0 && timer > window {
                if self.inside_window.swap(false) {
                    event = SyncEvent::WindowViolated;
                }
            } else {
                self.inside_window.store(true);
            }

            if period != 0 && timer > self.timeout() && nmt == NmtState::Operational {
                errors.report(
                    ErrorKind::SyncTimeout,
                    emergency_codes::COMMUNICATION,
                    timer,
                );
            } else if event == SyncEvent::Sync || period == 0 {
                errors.reset(ErrorKind::SyncTimeout, timer);
            }

            let receive_error = self.receive_error.swap(0);
            if receive_error != 0 {
                errors.report(
                    ErrorKind::SyncLength,
                    emergency_codes::SYNC_DATA_LENGTH,
                    receive_error as u32,
                );
            }
        } else {
            self.rx_new.store(false);
            self.receive_error.store(0);
        }

        event
    }

    fn write_cob_id(&self, value: u32) -> Result<(), AbortCode> {
        let word = CobIdWord(value);
        if word.is_extended() {
            return Err(AbortCode::InvalidValue);
        }
        let producer = word.bit30();
        if producer {
            if self.is_producer() {
                return Err(AbortCode::CantStoreDeviceState);
            }
            if self.counter_overflow() != 0 {
                self.counter.store(0);
                self.timer_us.store(0);
            }
        }
        self.producer.store(producer);
        self.cob_id.store(value);
        info!(
            "SYNC {} on 0x{:x}",
            if producer { "producer" } else { "consumer" },
            word.std_id()
        );
        Ok(())
    }

    fn write_period(&self, value: u32) {
        if self.period() == 0 && value != 0 {
            self.counter.store(0);
        }
        self.period_us.store(value);
        self.timeout_us.store(sync_timeout(value));
        self.timer_us.store(0);
    }

    fn write_counter_overflow(&self, value: u8) -> Result<(), AbortCode> {
        if self.period() != 0 {
            return Err(AbortCode::CantStoreDeviceState);
        }
        self.counter_overflow.store(value);
        Ok(())
    }
}

/// Selects which SYNC parameter a [`SyncParamObject`] exposes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncParam {
    /// Object 0x1005
    CobId,
    /// Object 0x1006
    Period,
    /// Object 0x1007
    Window,
    /// Object 0x1019
    CounterOverflow,
}

/// Object dictionary access to one of the SYNC parameters
#[allow(missing_debug_implementations)]
pub struct SyncParamObject {
    node: &'static dyn NodeStateAccess,
    param: SyncParam,
}

impl SyncParamObject {
    /// Create a new object for `param`
    pub const fn new(node: &'static dyn NodeStateAccess, param: SyncParam) -> Self {
        Self { node, param }
    }
}

impl ObjectAccess for SyncParamObject {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        if sub != 0 {
            return Err(AbortCode::NoSuchSubIndex);
        }
        let sync = self.node.sync();
        match self.param {
            SyncParam::CobId => read_value_bytes(&sync.cob_id_param().to_le_bytes(), offset, buf),
            SyncParam::Period => read_value_bytes(&sync.period().to_le_bytes(), offset, buf),
            SyncParam::Window => read_value_bytes(&sync.window().to_le_bytes(), offset, buf),
            SyncParam::CounterOverflow => read_value_bytes(&[sync.counter_overflow()], offset, buf),
        }
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(self.sub_info(sub)?.size)
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        self.sub_info(sub)?;
        let sync = self.node.sync();
        match self.param {
            SyncParam::CobId => sync.write_cob_id(u32_from_data(data)?),
            SyncParam::Period => {
                sync.write_period(u32_from_data(data)?);
                Ok(())
            }
            SyncParam::Window => {
                sync.set_window(u32_from_data(data)?);
                Ok(())
            }
            SyncParam::CounterOverflow => sync.write_counter_overflow(u8_from_data(data)?),
        }
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Var
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        if sub != 0 {
            return Err(AbortCode::NoSuchSubIndex);
        }
        Ok(match self.param {
            SyncParam::CounterOverflow => SubInfo::new_u8().rw_access(),
            _ => SubInfo::new_u32().rw_access(),
        })
    }
}
