//! Implements mailbox for receiving CAN messages
use pdosync_common::{AtomicCell, CanId, CanMessage};

use crate::node_state::NodeStateAccess;

/// A data structure to be shared between a receiving thread (e.g. a CAN controller IRQ) and the
/// [`Node`](crate::Node) object.
///
/// Incoming messages should be passed to [NodeMbox::store_message].
#[allow(missing_debug_implementations)]
pub struct NodeMbox {
    state: &'static dyn NodeStateAccess,
    notify_cb: AtomicCell<Option<&'static (dyn Fn() + Sync)>>,
}

impl NodeMbox {
    /// Create a new NodeMbox
    ///
    /// # Args
    ///
    /// - `state`: The node state holding the SYNC object and the receive PDOs
    pub const fn new(state: &'static dyn NodeStateAccess) -> Self {
        Self {
            state,
            notify_cb: AtomicCell::new(None),
        }
    }

    /// Set a callback for notification when a SYNC is received and the node should be processed.
    ///
    /// It must be static. Usually this will be a static fn, but in some circumstances, it may be
    /// desirable to use Box::leak to pass a heap allocated closure instead.
    pub fn set_process_notify_callback(&self, callback: &'static (dyn Fn() + Sync)) {
        self.notify_cb.store(Some(callback));
    }

    fn notify(&self) {
        if let Some(notify_cb) = self.notify_cb.load() {
            notify_cb();
        }
    }

    /// Store a received CAN message
    ///
    /// SYNC messages and messages for a valid RPDO are consumed. Any other message is returned
    /// wrapped in an Err.
    pub fn store_message(&self, msg: CanMessage) -> Result<(), CanMessage> {
        let id = msg.id();
        let nmt_state = self.state.nmt_state();
        let sync = self.state.sync();

        if id == sync.cob_id() {
            if sync.receive(&msg, nmt_state) {
                self.notify();
            }
            return Ok(());
        }

        let toggle = sync.toggle();
        for rpdo in self.state.rpdos() {
            if rpdo.cob_id() == Some(id) {
                rpdo.receive(&msg, nmt_state, toggle);
                return Ok(());
            }
        }

        Err(msg)
    }

    /// The identifiers currently received by the node
    ///
    /// This can be used to configure acceptance filters in the CAN controller. It changes when
    /// PDOs are reconfigured.
    pub fn rx_filters(&self) -> impl Iterator<Item = CanId> + '_ {
        core::iter::once(self.state.sync().cob_id())
            .chain(self.state.rpdos().iter().filter_map(|rpdo| rpdo.cob_id()))
    }
}
