#![allow(dead_code)]
use integration_tests::{
    object_dict1::{restore_defaults, NODE_MBOX, NODE_STATE, OD_TABLE},
    sim_bus::{SimBus, SimBusReceiver, SimBusSender},
};
use pdosync_common::{messages::SyncObject, CanId, CanMessage, NmtState, NodeId};
use pdosync_node::{object_dict::find_object, sync::SyncEvent, Node};

pub const NODE_ID: u8 = 5;

/// Time advanced by each call to [`TestNode::tick`]
pub const TICK_US: u64 = 1000;

pub struct TestNode {
    pub node: Node,
    pub sender: SimBusSender,
    pub rx: SimBusReceiver,
    pub now_us: u64,
    _bus: SimBus,
}

impl TestNode {
    /// Create an operational node with default parameters
    pub fn new() -> Self {
        Self::with_queue(16)
    }

    pub fn with_queue(capacity: usize) -> Self {
        restore_defaults();
        let bus = SimBus::new(capacity);
        let mut node = Node::new(
            NodeId::new(NODE_ID).unwrap(),
            &NODE_MBOX,
            &NODE_STATE,
            &OD_TABLE,
        );
        node.set_nmt_state(NmtState::Operational);
        let mut test_node = Self {
            node,
            sender: bus.new_sender(),
            rx: bus.new_receiver(),
            now_us: 0,
            _bus: bus,
        };
        // The first tick only establishes the time base
        test_node.process(0);
        test_node
    }

    pub fn process(&mut self, elapsed_us: u64) -> SyncEvent {
        self.now_us += elapsed_us;
        self.node.process(self.now_us, &mut self.sender)
    }

    pub fn tick(&mut self) -> SyncEvent {
        self.process(TICK_US)
    }

    /// Deliver a SYNC frame, then run a tick
    pub fn sync(&mut self, counter: Option<u8>) -> SyncEvent {
        let msg = SyncObject::new(counter).to_can_message(CanId::std(0x80));
        NODE_MBOX.store_message(msg).unwrap();
        self.tick()
    }

    pub fn deliver(&mut self, id: u16, data: &[u8]) {
        NODE_MBOX
            .store_message(CanMessage::new(CanId::std(id), data))
            .unwrap();
    }

    pub fn sent(&mut self) -> Vec<CanMessage> {
        self.rx.drain()
    }
}

pub fn write_u8(index: u16, sub: u8, value: u8) {
    od_write(index, sub, &[value]).unwrap();
}

pub fn write_u16(index: u16, sub: u8, value: u16) {
    od_write(index, sub, &value.to_le_bytes()).unwrap();
}

pub fn write_u32(index: u16, sub: u8, value: u32) {
    od_write(index, sub, &value.to_le_bytes()).unwrap();
}

pub fn od_write(
    index: u16,
    sub: u8,
    data: &[u8],
) -> Result<(), pdosync_common::sdo::AbortCode> {
    find_object(&OD_TABLE, index)
        .expect("Object not in dictionary")
        .write(sub, data)
}

pub fn read_u32(index: u16, sub: u8) -> u32 {
    find_object(&OD_TABLE, index)
        .expect("Object not in dictionary")
        .read_u32(sub)
        .unwrap()
}

pub fn read_u8(index: u16, sub: u8) -> u8 {
    find_object(&OD_TABLE, index)
        .expect("Object not in dictionary")
        .read_u8(sub)
        .unwrap()
}

/// Map a PDO through its communication and mapping objects and enable it on its default COB-ID
///
/// `comm_index` is the communication object, and the mapping object is found 0x200 above it.
pub fn configure_pdo(comm_index: u16, transmission_type: u8, mappings: &[u32]) {
    let map_index = comm_index + 0x200;
    let cob_id = read_u32(comm_index, 1);
    write_u32(comm_index, 1, cob_id | (1 << 31));
    write_u8(map_index, 0, 0);
    for (i, m) in mappings.iter().enumerate() {
        write_u32(map_index, i as u8 + 1, *m);
    }
    write_u8(map_index, 0, mappings.len() as u8);
    write_u8(comm_index, 2, transmission_type);
    write_u32(comm_index, 1, cob_id & !(1 << 31));
}
