//! Process data and SYNC handling for a CANopen node
//!
//! Pdosync-node implements the real-time data exchange parts of a CANopen node: the receive and
//! transmit process data objects (PDOs), and the SYNC object which coordinates synchronous PDOs
//! across the network. It is primarily intended to be run on microcontrollers, and so it is
//! no_std compatible and performs no heap allocation, instead statically allocating storage. It
//! provides the following features:
//!
//! * Resolves *PDO mappings* from the mapping parameters in the object dictionary, including dummy
//!   entries and mappings which cover only the low bytes of a value.
//! * Implements *receive PDOs*, writing received frames into the mapped objects either immediately
//!   or on the next SYNC.
//! * Implements *transmit PDOs*, sent on request, on change of state, on an event timer, or
//!   cyclically on SYNC, with support for the inhibit time and SYNC start value.
//! * Implements the *SYNC* object as consumer or producer, including the SYNC counter, the
//!   synchronous window, and SYNC timeout monitoring.
//! * Provides the PDO and SYNC parameter objects for the object dictionary, which validate writes
//!   and apply them to the running PDOs.
//! * Reports communication errors through an [`ErrorSink`].
//!
//! # Getting Started
//!
//! ## Static allocation
//!
//! The node state, mailbox, and all objects are allocated statically, so that they can be shared
//! between the receive interrupt, the processing task, and the object dictionary.
//!
//! ```ignore
//! use pdosync_node::common::objects::{PdoMapping, SubInfo};
//! use pdosync_node::object_dict::{ODEntry, VarObject};
//! use pdosync_node::{
//!     ErrorStatus, NodeMbox, NodeState, RpdoCommObject, RpdoMappingObject, SyncParam,
//!     SyncParamObject,
//! };
//!
//! static ERRORS: ErrorStatus = ErrorStatus::new();
//! static NODE_STATE: NodeState<4, 4> = NodeState::new(&ERRORS);
//! static NODE_MBOX: NodeMbox = NodeMbox::new(&NODE_STATE);
//!
//! static SYNC_COB_ID: SyncParamObject = SyncParamObject::new(&NODE_STATE, SyncParam::CobId);
//! static RPDO0_COMM: RpdoCommObject = RpdoCommObject::new(&NODE_STATE, 0);
//! static RPDO0_MAPPING: RpdoMappingObject = RpdoMappingObject::new(&NODE_STATE, 0);
//! static SETPOINT: VarObject<u16> =
//!     VarObject::new(0, SubInfo::new_u16().rw_access().pdo_mapping(PdoMapping::Rpdo));
//!
//! // Must be sorted by index
//! static OD_TABLE: [ODEntry; 4] = [
//!     ODEntry { index: 0x1005, data: &SYNC_COB_ID },
//!     ODEntry { index: 0x1400, data: &RPDO0_COMM },
//!     ODEntry { index: 0x1600, data: &RPDO0_MAPPING },
//!     ODEntry { index: 0x2000, data: &SETPOINT },
//! ];
//! ```
//!
//! ## Node Creation
//!
//! Instantiate the node by providing it with the OD, the mailbox, and the node state object. PDO
//! parameters can be set up beforehand through the objects, or from a
//! [DeviceConfig](common::device_config::DeviceConfig) with [`Node::load_config`] when the `std`
//! feature is enabled.
//!
//! ```ignore
//! let mut node = Node::new(NodeId::new(5).unwrap(), &NODE_MBOX, &NODE_STATE, &OD_TABLE);
//! node.set_nmt_state(NmtState::Operational);
//! ```
//!
//! ## Handling CAN messages
//!
//! The application has to handle sending and receiving CAN messages.
//!
//! Received messages should be passed to the `NODE_MBOX` struct. This can be done in any thread;
//! a good way to do it is to have the CAN controller receive interrupt store messages here
//! directly.
//!
//! ```ignore
//! // Ignore error, as an Err is returned for messages that are not consumed by the node
//! NODE_MBOX.store_message(msg).ok();
//! ```
//!
//! To execute the node logic, the [`Node::process`] function must be called periodically, with a
//! monotonic time in microseconds and a [`CanSender`](common::traits::CanSender) for transmitting
//! messages. The mailbox provides a callback which can be used to notify the processing task when
//! a SYNC has been received.
//!
//! ```ignore
//! loop {
//!     wait_for_notify_or_timeout(Duration::from_millis(1));
//!     node.process(now_us(), &mut |msg| can_tx.transmit(msg));
//! }
//! ```
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::comparison_chain)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error_sink;
mod node;
mod node_mbox;
mod node_state;
pub mod object_dict;
pub mod pdo;
pub mod sync;

// Re-export types used by applications when declaring their statics
pub use critical_section;
pub use pdosync_common as common;

pub use error_sink::{ErrorKind, ErrorReport, ErrorSink, ErrorStatus};
pub use node::Node;
pub use node_mbox::NodeMbox;
pub use node_state::{NodeState, NodeStateAccess};
pub use pdo::{
    PdoRestrictions, Rpdo, RpdoCommObject, RpdoMappingObject, Tpdo, TpdoCommObject,
    TpdoMappingObject,
};
pub use sync::{SyncEvent, SyncParam, SyncParamObject, SyncState};
