//! The tick driver for the PDO and SYNC processing
use defmt_or_log::{info, warn};
use pdosync_common::{
    constants::values::{default_rpdo_cob_id, default_tpdo_cob_id},
    pdo::CobIdWord,
    traits::{CanSendError, CanSender},
    NmtState, NodeId,
};

use crate::{
    error_sink::{emergency_codes, ErrorKind},
    node_mbox::NodeMbox,
    node_state::NodeStateAccess,
    object_dict::ODEntry,
    pdo::PdoParams,
    sync::SyncEvent,
};

/// The main object representing a node
///
/// The node owns no state itself: the PDOs and SYNC object live in a statically allocated
/// [`NodeState`](crate::NodeState), so that they can be reached from the object dictionary and from
/// the receive context through the [`NodeMbox`].
///
/// [`Node::process`] must be called periodically by the application. Each call advances the SYNC
/// object, applies received RPDO data, and sends any TPDOs which are due.
#[allow(missing_debug_implementations)]
pub struct Node {
    node_id: NodeId,
    mbox: &'static NodeMbox,
    state: &'static dyn NodeStateAccess,
    od: &'static [ODEntry<'static>],
    last_process_time_us: Option<u64>,
}

impl Node {
    /// Create a new node
    ///
    /// # Arguments
    ///
    /// - `node_id`: The node ID, which is added to the pre-defined PDO identifiers
    /// - `mbox`: The mailbox used to pass received messages to the node
    /// - `state`: The node state referenced by `mbox` and the PDO objects in `od`
    /// - `od`: The object dictionary. It must be sorted by index.
    ///
    /// The PDOs and SYNC object are brought into running state from their stored parameters, as
    /// by [`Node::reset_communication`].
    pub fn new(
        node_id: NodeId,
        mbox: &'static NodeMbox,
        state: &'static dyn NodeStateAccess,
        od: &'static [ODEntry<'static>],
    ) -> Self {
        state.set_od(od);
        let mut node = Self {
            node_id,
            mbox,
            state,
            od,
            last_process_time_us: None,
        };
        node.assign_identity();
        node.reset_communication();
        node
    }

    /// Give each PDO its pre-defined identifier and the node ID
    fn assign_identity(&self) {
        fn assign(params: &PdoParams, default_cob_id: u16, node_id: u8) {
            params.set_identity(default_cob_id, node_id);
            // PDOs which were never configured start disabled on their pre-defined identifier
            if params.cob_id() == CobIdWord::INVALID {
                params.set_cob_id(CobIdWord::INVALID | default_cob_id as u32);
            }
        }
        let node_id = self.node_id.cob_id_offset();
        for (i, rpdo) in self.state.rpdos().iter().enumerate() {
            assign(rpdo.params(), default_rpdo_cob_id(i), node_id);
        }
        for (i, tpdo) in self.state.tpdos().iter().enumerate() {
            assign(tpdo.params(), default_tpdo_cob_id(i), node_id);
        }
    }

    /// Re-apply the stored parameters of all PDOs and the SYNC object
    ///
    /// Mappings are resolved before the communication parameters, so that PDOs with a valid
    /// mapping and COB-ID become valid.
    pub fn reset_communication(&mut self) {
        let errors = self.state.errors();
        self.state.sync().reset();
        for rpdo in self.state.rpdos() {
            rpdo.reset(self.od, errors);
        }
        for tpdo in self.state.tpdos() {
            tpdo.reset(self.od, errors);
        }
    }

    /// The node ID
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Change the node ID and reset communication
    pub fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
        self.assign_identity();
        self.reset_communication();
    }

    /// The current NMT state
    pub fn nmt_state(&self) -> NmtState {
        self.state.nmt_state()
    }

    /// Change the NMT state
    ///
    /// PDOs are only exchanged while operational. SYNC is processed while operational or
    /// pre-operational.
    pub fn set_nmt_state(&mut self, nmt_state: NmtState) {
        let prev = self.state.nmt_state();
        if prev != nmt_state {
            info!("NMT state {} -> {}", prev as u8, nmt_state as u8);
            self.state.set_nmt_state(nmt_state);
        }
    }

    /// The mailbox for received messages
    pub fn mbox(&self) -> &'static NodeMbox {
        self.mbox
    }

    /// The identifiers the node currently receives, for programming acceptance filters
    ///
    /// See [`NodeMbox::rx_filters`].
    pub fn rx_filters(&self) -> impl Iterator<Item = pdosync_common::CanId> + 'static {
        self.mbox.rx_filters()
    }

    /// Run one tick
    ///
    /// `now_us` is a monotonic time in microseconds. Frames are sent via `sender`. A full transmit
    /// queue is reported to the error sink, and does not prevent the remaining PDOs from being
    /// processed.
    ///
    /// Returns the SYNC event which occurred during this tick.
    pub fn process(&mut self, now_us: u64, sender: &mut dyn CanSender) -> SyncEvent {
        let elapsed_us = match self.last_process_time_us {
            Some(last) => now_us.saturating_sub(last).min(u32::MAX as u64) as u32,
            None => 0,
        };
        self.last_process_time_us = Some(now_us);

        let nmt_state = self.state.nmt_state();
        let errors = self.state.errors();
        let sync = self.state.sync();

        let event = sync.process(elapsed_us, nmt_state, sender, errors);
        if event == SyncEvent::WindowViolated {
            sender.clear_pending_sync();
        }
        let sync_occurred = event == SyncEvent::Sync;
        let toggle = sync.toggle();

        for rpdo in self.state.rpdos() {
            rpdo.process(sync_occurred, toggle, nmt_state);
        }

        for tpdo in self.state.tpdos() {
            if !tpdo.send_requested() && tpdo.is_change_of_state() {
                tpdo.request_send();
            }
            match tpdo.process(sync, sync_occurred, elapsed_us, nmt_state, sender) {
                Ok(true) => errors.reset(ErrorKind::CanTxOverflow, 0),
                Ok(false) => (),
                Err(CanSendError(msg)) => {
                    warn!("TPDO on 0x{:x} dropped, transmit queue full", msg.id.raw());
                    errors.report(
                        ErrorKind::CanTxOverflow,
                        emergency_codes::CAN_OVERRUN,
                        msg.id.raw(),
                    );
                }
            }
        }

        event
    }

    /// Apply a device configuration and reset communication
    ///
    /// Entries for PDOs which the node does not have are ignored.
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn load_config(&mut self, config: &pdosync_common::device_config::DeviceConfig) {
        use crate::pdo::PdoRestrictions;

        match NodeId::new(config.node_id) {
            Ok(node_id) => self.node_id = node_id,
            Err(_) => warn!("Ignoring invalid node ID {}", config.node_id),
        }
        self.assign_identity();

        let sync = self.state.sync();
        sync.set_cob_id_param(config.sync.cob_id);
        sync.set_period(config.sync.period_us);
        sync.set_window(config.sync.window_us);
        sync.set_counter_overflow(config.sync.counter_overflow);

        let rpdos = self.state.rpdos();
        for (i, cfg) in config.rpdos.iter().enumerate() {
            let Some(rpdo) = rpdos.get(i) else {
                warn!("Ignoring config for RPDO{}, node has {}", i, rpdos.len());
                continue;
            };
            let params = rpdo.params();
            params.set_cob_id(cfg.cob_id.unwrap_or(params.default_cob_id() as u32));
            params.set_transmission_type(cfg.transmission_type);
            params.set_mappings(&cfg.mappings);
            params.set_restrictions(PdoRestrictions::from_bits(cfg.restrictions));
        }

        let tpdos = self.state.tpdos();
        for (i, cfg) in config.tpdos.iter().enumerate() {
            let Some(tpdo) = tpdos.get(i) else {
                warn!("Ignoring config for TPDO{}, node has {}", i, tpdos.len());
                continue;
            };
            let params = tpdo.params();
            params.set_cob_id(cfg.cob_id.unwrap_or(params.default_cob_id() as u32));
            params.set_transmission_type(cfg.transmission_type);
            params.set_mappings(&cfg.mappings);
            params.set_restrictions(PdoRestrictions::from_bits(cfg.restrictions));
            tpdo.set_inhibit_time(cfg.inhibit_time);
            tpdo.set_event_time(cfg.event_timer);
            tpdo.set_sync_start(cfg.sync_start);
        }

        self.reset_communication();
    }
}
