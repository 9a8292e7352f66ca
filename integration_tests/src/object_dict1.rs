//! A statically allocated node with two RPDOs, two TPDOs, and a handful of application objects
//!
//! | Index  | Object                                         |
//! |--------|------------------------------------------------|
//! | 0x2000 | u32, mappable to RPDOs and TPDOs               |
//! | 0x2001 | u32, mappable to RPDOs and TPDOs               |
//! | 0x2002 | u16, TPDO mappable with change-of-state        |
//! | 0x2003 | array of 4 u8, mappable to RPDOs and TPDOs     |
//! | 0x2004 | read only i16, TPDO mappable                   |
use pdosync_common::{
    objects::{PdoMapping, SubInfo},
    pdo::CobIdWord,
};
use pdosync_node::{
    object_dict::{ArrayObject, ODEntry, ScalarField, VarObject},
    pdo::PdoRestrictions,
    ErrorStatus, NodeMbox, NodeState, NodeStateAccess, RpdoCommObject, RpdoMappingObject,
    SyncParam, SyncParamObject, TpdoCommObject, TpdoMappingObject,
};

pub static ERRORS: ErrorStatus = ErrorStatus::new();
pub static NODE_STATE: NodeState<2, 2> = NodeState::new(&ERRORS);
pub static NODE_MBOX: NodeMbox = NodeMbox::new(&NODE_STATE);

pub static SYNC_COB_ID: SyncParamObject = SyncParamObject::new(&NODE_STATE, SyncParam::CobId);
pub static SYNC_PERIOD: SyncParamObject = SyncParamObject::new(&NODE_STATE, SyncParam::Period);
pub static SYNC_WINDOW: SyncParamObject = SyncParamObject::new(&NODE_STATE, SyncParam::Window);
pub static SYNC_OVERFLOW: SyncParamObject =
    SyncParamObject::new(&NODE_STATE, SyncParam::CounterOverflow);

pub static RPDO0_COMM: RpdoCommObject = RpdoCommObject::new(&NODE_STATE, 0);
pub static RPDO1_COMM: RpdoCommObject = RpdoCommObject::new(&NODE_STATE, 1);
pub static RPDO0_MAPPING: RpdoMappingObject = RpdoMappingObject::new(&NODE_STATE, 0);
pub static RPDO1_MAPPING: RpdoMappingObject = RpdoMappingObject::new(&NODE_STATE, 1);
pub static TPDO0_COMM: TpdoCommObject = TpdoCommObject::new(&NODE_STATE, 0);
pub static TPDO1_COMM: TpdoCommObject = TpdoCommObject::new(&NODE_STATE, 1);
pub static TPDO0_MAPPING: TpdoMappingObject = TpdoMappingObject::new(&NODE_STATE, 0);
pub static TPDO1_MAPPING: TpdoMappingObject = TpdoMappingObject::new(&NODE_STATE, 1);

pub static OBJECT2000: VarObject<u32> = VarObject::new(
    0,
    SubInfo::new_u32()
        .rw_access()
        .pdo_mapping(PdoMapping::Both),
);
pub static OBJECT2001: VarObject<u32> = VarObject::new(
    0,
    SubInfo::new_u32()
        .rw_access()
        .pdo_mapping(PdoMapping::Both),
);
pub static OBJECT2002: VarObject<u16> = VarObject::new(
    0,
    SubInfo::new_u16()
        .rw_access()
        .pdo_mapping(PdoMapping::Tpdo)
        .detect_cos(true),
);
pub static OBJECT2003: ArrayObject<u8, 4> = ArrayObject::new(
    [
        ScalarField::new(0),
        ScalarField::new(0),
        ScalarField::new(0),
        ScalarField::new(0),
    ],
    SubInfo::new_u8()
        .rw_access()
        .pdo_mapping(PdoMapping::Both),
);
pub static OBJECT2004: VarObject<i16> = VarObject::new(
    -1,
    SubInfo::new_i16()
        .ro_access()
        .pdo_mapping(PdoMapping::Tpdo),
);

pub static OD_TABLE: [ODEntry<'static>; 17] = [
    ODEntry {
        index: 0x1005,
        data: &SYNC_COB_ID,
    },
    ODEntry {
        index: 0x1006,
        data: &SYNC_PERIOD,
    },
    ODEntry {
        index: 0x1007,
        data: &SYNC_WINDOW,
    },
    ODEntry {
        index: 0x1019,
        data: &SYNC_OVERFLOW,
    },
    ODEntry {
        index: 0x1400,
        data: &RPDO0_COMM,
    },
    ODEntry {
        index: 0x1401,
        data: &RPDO1_COMM,
    },
    ODEntry {
        index: 0x1600,
        data: &RPDO0_MAPPING,
    },
    ODEntry {
        index: 0x1601,
        data: &RPDO1_MAPPING,
    },
    ODEntry {
        index: 0x1800,
        data: &TPDO0_COMM,
    },
    ODEntry {
        index: 0x1801,
        data: &TPDO1_COMM,
    },
    ODEntry {
        index: 0x1A00,
        data: &TPDO0_MAPPING,
    },
    ODEntry {
        index: 0x1A01,
        data: &TPDO1_MAPPING,
    },
    ODEntry {
        index: 0x2000,
        data: &OBJECT2000,
    },
    ODEntry {
        index: 0x2001,
        data: &OBJECT2001,
    },
    ODEntry {
        index: 0x2002,
        data: &OBJECT2002,
    },
    ODEntry {
        index: 0x2003,
        data: &OBJECT2003,
    },
    ODEntry {
        index: 0x2004,
        data: &OBJECT2004,
    },
];

/// Return all stored parameters and application values to their power-on state
///
/// The statics are shared by every test in a binary, so each test starts with this.
pub fn restore_defaults() {
    for rpdo in NODE_STATE.rpdos() {
        let params = rpdo.params();
        params.set_cob_id(CobIdWord::INVALID);
        params.set_transmission_type(0);
        params.set_mappings(&[]);
        params.set_restrictions(PdoRestrictions::NONE);
    }
    for tpdo in NODE_STATE.tpdos() {
        let params = tpdo.params();
        params.set_cob_id(CobIdWord::INVALID);
        params.set_transmission_type(0);
        params.set_mappings(&[]);
        params.set_restrictions(PdoRestrictions::NONE);
        tpdo.set_inhibit_time(0);
        tpdo.set_event_time(0);
        tpdo.set_sync_start(0);
    }
    let sync = NODE_STATE.sync();
    sync.set_cob_id_param(0x80);
    sync.set_period(0);
    sync.set_window(0);
    sync.set_counter_overflow(0);
    NODE_STATE.set_nmt_state(Default::default());
    ERRORS.clear();

    OBJECT2000.store(0);
    OBJECT2001.store(0);
    OBJECT2002.store(0);
    for i in 0..4 {
        OBJECT2003.store(i, 0);
    }
}
