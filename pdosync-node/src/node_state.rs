//! Statically allocated state shared by the node, the mailbox and the dictionary objects

use pdosync_common::{AtomicCell, NmtState};

use crate::{
    error_sink::ErrorSink,
    object_dict::ODEntry,
    pdo::{Rpdo, Tpdo},
    sync::SyncState,
};

/// Access to the state shared between the [`Node`](crate::Node), the
/// [`NodeMbox`](crate::NodeMbox), and the PDO and SYNC objects in the object dictionary
///
/// This allows the dictionary objects to hold a reference to the state without knowing the number
/// of PDOs.
pub trait NodeStateAccess: Sync + Send {
    /// The receive PDOs
    fn rpdos(&self) -> &[Rpdo];
    /// The transmit PDOs
    fn tpdos(&self) -> &[Tpdo];
    /// The SYNC object
    fn sync(&self) -> &SyncState;
    /// The sink for communication errors
    fn errors(&self) -> &dyn ErrorSink;
    /// The current NMT state
    fn nmt_state(&self) -> NmtState;
    /// Change the NMT state
    fn set_nmt_state(&self, state: NmtState);
    /// The object dictionary the PDOs are mapped into, once the node has been created
    fn od(&self) -> Option<&'static [ODEntry<'static>]>;
    /// Register the object dictionary
    fn set_od(&self, od: &'static [ODEntry<'static>]);
}

/// The state of a node with `N_RPDO` receive PDOs and `N_TPDO` transmit PDOs
///
/// This is intended to be allocated statically, so that the object dictionary can refer to it:
///
/// ```
/// use pdosync_node::{ErrorStatus, NodeState, RpdoCommObject};
///
/// static ERRORS: ErrorStatus = ErrorStatus::new();
/// static NODE_STATE: NodeState<4, 4> = NodeState::new(&ERRORS);
/// static RPDO0_COMM: RpdoCommObject = RpdoCommObject::new(&NODE_STATE, 0);
/// ```
#[allow(missing_debug_implementations)]
pub struct NodeState<const N_RPDO: usize, const N_TPDO: usize> {
    rpdos: [Rpdo; N_RPDO],
    tpdos: [Tpdo; N_TPDO],
    sync: SyncState,
    nmt_state: AtomicCell<NmtState>,
    errors: &'static dyn ErrorSink,
    od: AtomicCell<Option<&'static [ODEntry<'static>]>>,
}

impl<const N_RPDO: usize, const N_TPDO: usize> NodeState<N_RPDO, N_TPDO> {
    /// Create a new node state, reporting errors to `errors`
    pub const fn new(errors: &'static dyn ErrorSink) -> Self {
        Self {
            rpdos: [const { Rpdo::new() }; N_RPDO],
            tpdos: [const { Tpdo::new() }; N_TPDO],
            sync: SyncState::new(),
            nmt_state: AtomicCell::new(NmtState::Bootup),
            errors,
            od: AtomicCell::new(None),
        }
    }
}

impl<const N_RPDO: usize, const N_TPDO: usize> NodeStateAccess for NodeState<N_RPDO, N_TPDO> {
    fn rpdos(&self) -> &[Rpdo] {
        &self.rpdos
    }

    fn tpdos(&self) -> &[Tpdo] {
        &self.tpdos
    }

    fn sync(&self) -> &SyncState {
        &self.sync
    }

    fn errors(&self) -> &dyn ErrorSink {
        self.errors
    }

    fn nmt_state(&self) -> NmtState {
        self.nmt_state.load()
    }

    fn set_nmt_state(&self, state: NmtState) {
        self.nmt_state.store(state);
    }

    fn od(&self) -> Option<&'static [ODEntry<'static>]> {
        self.od.load()
    }

    fn set_od(&self, od: &'static [ODEntry<'static>]) {
        self.od.store(Some(od));
    }
}
