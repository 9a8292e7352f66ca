//! Test node PDO operations through the object dictionary and the mailbox

use integration_tests::object_dict1::{
    ERRORS, NODE_STATE, OBJECT2000, OBJECT2001, OBJECT2002, OBJECT2003,
};
use pdosync_common::{sdo::AbortCode, CanId, NmtState};
use pdosync_node::{
    error_sink::emergency_codes, pdo::PdoRestrictions, ErrorKind, NodeStateAccess,
};

mod utils;
use utils::*;

const RPDO0_COMM: u16 = 0x1400;
const RPDO1_COMM: u16 = 0x1401;
const RPDO0_MAP: u16 = 0x1600;
const TPDO0_COMM: u16 = 0x1800;
const TPDO1_COMM: u16 = 0x1801;

#[test]
#[serial_test::serial]
fn test_default_comm_params() {
    let _node = TestNode::new();

    assert_eq!(2, read_u8(RPDO0_COMM, 0));
    assert_eq!(6, read_u8(TPDO0_COMM, 0));
    // Not valid, on the pre-defined identifiers
    assert_eq!(0x8000_0205, read_u32(RPDO0_COMM, 1));
    assert_eq!(0x8000_0305, read_u32(RPDO1_COMM, 1));
    assert_eq!(0x8000_0185, read_u32(TPDO0_COMM, 1));
    assert_eq!(0x8000_0285, read_u32(TPDO1_COMM, 1));
    assert_eq!(0, read_u8(RPDO0_MAP, 0));
}

#[test]
#[serial_test::serial]
fn test_async_rpdo_applies_at_next_tick() {
    let mut t = TestNode::new();
    configure_pdo(RPDO0_COMM, 254, &[0x2000_0020]);
    assert_eq!(0x205, read_u32(RPDO0_COMM, 1));
    assert_eq!(1, read_u8(RPDO0_MAP, 0));
    assert_eq!(Some(CanId::std(0x205)), NODE_STATE.rpdos()[0].cob_id());

    t.deliver(0x205, &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(0, OBJECT2000.load());
    t.tick();
    assert_eq!(u32::from_le_bytes([1, 2, 3, 4]), OBJECT2000.load());
}

#[test]
#[serial_test::serial]
fn test_rpdo_partial_and_dummy_mapping() {
    let mut t = TestNode::new();
    OBJECT2000.store(0xAABB_CCDD);
    // Low 16 bits of 0x2000, a dummy byte, then 0x2003 sub 1
    configure_pdo(RPDO1_COMM, 255, &[0x2000_0010, 0x0005_0008, 0x2003_0108]);

    t.deliver(0x305, &[0x11, 0x22, 0xFF, 0x33]);
    t.tick();
    assert_eq!(0xAABB_2211, OBJECT2000.load());
    assert_eq!(Some(0x33), OBJECT2003.load(0));
    assert_eq!(Some(0), OBJECT2003.load(1));
}

#[test]
#[serial_test::serial]
fn test_short_rpdo_frame_is_ignored() {
    let mut t = TestNode::new();
    configure_pdo(RPDO0_COMM, 254, &[0x2000_0020]);

    t.deliver(0x205, &[1, 2, 3]);
    t.tick();
    assert_eq!(0, OBJECT2000.load());
}

#[test]
#[serial_test::serial]
fn test_rpdo_ignored_unless_operational() {
    let mut t = TestNode::new();
    configure_pdo(RPDO0_COMM, 254, &[0x2000_0020]);
    t.node.set_nmt_state(NmtState::PreOperational);

    t.deliver(0x205, &[1, 0, 0, 0]);
    t.tick();
    assert_eq!(0, OBJECT2000.load());

    t.node.set_nmt_state(NmtState::Operational);
    t.deliver(0x205, &[2, 0, 0, 0]);
    t.tick();
    assert_eq!(2, OBJECT2000.load());
}

#[test]
#[serial_test::serial]
fn test_sync_rpdo_applied_at_next_sync() {
    let mut t = TestNode::new();
    configure_pdo(RPDO0_COMM, 1, &[0x2000_0020]);

    t.deliver(0x205, &10u32.to_le_bytes());
    t.tick();
    t.tick();
    assert_eq!(0, OBJECT2000.load());

    t.sync(None);
    assert_eq!(10, OBJECT2000.load());

    // Received after the SYNC, so it waits for the following one
    t.deliver(0x205, &20u32.to_le_bytes());
    t.tick();
    assert_eq!(10, OBJECT2000.load());
    t.sync(None);
    assert_eq!(20, OBJECT2000.load());

    // Nothing new to apply
    t.sync(None);
    assert_eq!(20, OBJECT2000.load());
}

#[test]
#[serial_test::serial]
fn test_sync_tpdo_every_sync() {
    let mut t = TestNode::new();
    OBJECT2003.store(0, 7);
    configure_pdo(TPDO0_COMM, 1, &[0x2003_0108]);

    t.tick();
    assert!(t.sent().is_empty());

    for _ in 0..3 {
        t.sync(None);
        let sent = t.sent();
        assert_eq!(1, sent.len());
        assert_eq!(CanId::std(0x185), sent[0].id);
        assert_eq!(&[7u8], sent[0].data());
    }
    assert_eq!(3, t.sender.sync_pdos_sent);
}

#[test]
#[serial_test::serial]
fn test_sync_tpdo_every_third_sync() {
    let mut t = TestNode::new();
    configure_pdo(TPDO0_COMM, 3, &[0x2003_0108]);

    let sends: Vec<usize> = (0..7).map(|_| {
        t.sync(None);
        t.sent().len()
    }).collect();
    assert_eq!(vec![0, 0, 1, 0, 0, 1, 0], sends);
}

#[test]
#[serial_test::serial]
fn test_sync_tpdo_waits_for_sync_start() {
    let mut t = TestNode::new();
    write_u8(0x1019, 0, 10);
    write_u32(TPDO0_COMM, 1, 0x8000_0185);
    write_u8(TPDO0_COMM, 6, 5);
    configure_pdo(TPDO0_COMM, 1, &[0x2003_0108]);

    let sends: Vec<usize> = [3, 4, 5, 6, 7]
        .iter()
        .map(|c| {
            t.sync(Some(*c));
            t.sent().len()
        })
        .collect();
    assert_eq!(vec![0, 0, 1, 1, 1], sends);
}

#[test]
#[serial_test::serial]
fn test_acyclic_sync_tpdo_sends_on_request() {
    let mut t = TestNode::new();
    configure_pdo(TPDO0_COMM, 0, &[0x2000_0020]);
    OBJECT2000.store(99);

    t.sync(None);
    assert!(t.sent().is_empty());

    NODE_STATE.tpdos()[0].request_send();
    t.tick();
    assert!(t.sent().is_empty());
    t.sync(None);
    let sent = t.sent();
    assert_eq!(1, sent.len());
    assert_eq!(&99u32.to_le_bytes(), sent[0].data());
}

#[test]
#[serial_test::serial]
fn test_tpdo_change_of_state() {
    let mut t = TestNode::new();
    configure_pdo(TPDO0_COMM, 254, &[0x2002_0010, 0x2001_0020]);

    // Settle against whatever frame was last sent on this PDO
    t.tick();
    t.sent();
    t.tick();
    assert!(t.sent().is_empty());

    // 0x2001 is not flagged for change detection
    OBJECT2001.store(5);
    t.tick();
    assert!(t.sent().is_empty());

    OBJECT2002.store(0x1234);
    t.tick();
    let sent = t.sent();
    assert_eq!(1, sent.len());
    assert_eq!(&[0x34u8, 0x12, 5, 0, 0, 0], sent[0].data());

    t.tick();
    assert!(t.sent().is_empty());
}

#[test]
#[serial_test::serial]
fn test_tpdo_inhibit_time() {
    let mut t = TestNode::new();
    // 2.5ms inhibit time
    write_u32(TPDO0_COMM, 1, 0x8000_0185);
    write_u16(TPDO0_COMM, 3, 25);
    configure_pdo(TPDO0_COMM, 254, &[0x2002_0010]);
    for _ in 0..3 {
        t.tick();
    }
    t.sent();

    OBJECT2002.store(1);
    t.tick();
    assert_eq!(1, t.sent().len());

    OBJECT2002.store(2);
    t.tick();
    t.tick();
    assert!(t.sent().is_empty());
    t.tick();
    let sent = t.sent();
    assert_eq!(1, sent.len());
    assert_eq!(&[2u8, 0], sent[0].data());

    // The inhibit time can't change while the PDO is valid
    assert_eq!(Err(AbortCode::InvalidValue), od_write(TPDO0_COMM, 3, &[0, 0]));
}

#[test]
#[serial_test::serial]
fn test_tpdo_event_timer() {
    let mut t = TestNode::new();
    configure_pdo(TPDO1_COMM, 254, &[0x2004_0010]);
    write_u16(TPDO1_COMM, 5, 5);
    assert_eq!(5, NODE_STATE.tpdos()[1].event_time());

    let mut sent = Vec::new();
    for _ in 0..5 {
        t.tick();
        sent.extend(t.sent());
    }
    assert!(sent.is_empty());
    t.tick();
    let sent = t.sent();
    assert_eq!(1, sent.len());
    assert_eq!(CanId::std(0x285), sent[0].id);
    assert_eq!(&(-1i16).to_le_bytes(), sent[0].data());

    let mut count = 0;
    for _ in 0..5 {
        t.tick();
        count += t.sent().len();
    }
    assert_eq!(1, count);
}

#[test]
#[serial_test::serial]
fn test_tpdo_overflow_is_reported() {
    let mut t = TestNode::with_queue(1);
    configure_pdo(TPDO0_COMM, 1, &[0x2003_0108]);
    configure_pdo(TPDO1_COMM, 1, &[0x2003_0208]);

    t.sync(None);
    let sent = t.sent();
    assert_eq!(1, sent.len());
    assert_eq!(CanId::std(0x185), sent[0].id);
    assert!(ERRORS.is_active(ErrorKind::CanTxOverflow));
    let report = ERRORS.last_report().unwrap();
    assert_eq!(ErrorKind::CanTxOverflow, report.kind);
    assert_eq!(emergency_codes::CAN_OVERRUN, report.code);
    assert_eq!(0x285, report.info);

    // A successful send clears the error
    write_u32(TPDO1_COMM, 1, 0x8000_0285);
    t.sync(None);
    assert_eq!(1, t.sent().len());
    assert!(!ERRORS.is_active(ErrorKind::CanTxOverflow));
}

#[test]
#[serial_test::serial]
fn test_dummy_mapping_sizes() {
    let _t = TestNode::new();
    // Integer8 dummy entry of one byte
    assert_eq!(Ok(()), od_write(RPDO0_MAP, 1, &0x0002_0008u32.to_le_bytes()));
    // Longer than the dummy type
    assert_eq!(
        Err(AbortCode::UnnallowedPdo),
        od_write(RPDO0_MAP, 1, &0x0002_0020u32.to_le_bytes())
    );
    // The rejected entry was not stored
    assert_eq!(0x0002_0008, read_u32(RPDO0_MAP, 1));
    write_u8(RPDO0_MAP, 0, 1);
    assert_eq!(1, NODE_STATE.rpdos()[0].data_len());
}

#[test]
#[serial_test::serial]
fn test_mapping_write_rejections() {
    let _t = TestNode::new();

    // Not RPDO mappable
    assert_eq!(
        Err(AbortCode::UnnallowedPdo),
        od_write(RPDO0_MAP, 1, &0x2002_0010u32.to_le_bytes())
    );
    // Read only
    assert_eq!(
        Err(AbortCode::UnnallowedPdo),
        od_write(RPDO0_MAP, 1, &0x2004_0010u32.to_le_bytes())
    );
    // Missing object, and missing sub object
    assert_eq!(
        Err(AbortCode::NoSuchObject),
        od_write(RPDO0_MAP, 1, &0x2100_0008u32.to_le_bytes())
    );
    assert_eq!(
        Err(AbortCode::NoSuchObject),
        od_write(RPDO0_MAP, 1, &0x2003_0508u32.to_le_bytes())
    );
    // More than 8 entries
    assert_eq!(Err(AbortCode::ValueTooHigh), od_write(RPDO0_MAP, 0, &[9]));

    // Longer than 8 bytes
    write_u32(RPDO0_MAP, 1, 0x2000_0020);
    write_u32(RPDO0_MAP, 2, 0x2001_0020);
    write_u32(RPDO0_MAP, 3, 0x2003_0108);
    assert_eq!(Err(AbortCode::PdoTooLong), od_write(RPDO0_MAP, 0, &[3]));
    assert!(ERRORS.is_active(ErrorKind::PdoWrongMapping));
    assert_eq!(0x2003_0100, ERRORS.last_report().unwrap().info);
    assert_eq!(0, read_u8(RPDO0_MAP, 0));

    // Entries can only change while nothing is mapped
    write_u8(RPDO0_MAP, 0, 2);
    assert_eq!(8, NODE_STATE.rpdos()[0].data_len());
    assert_eq!(
        Err(AbortCode::InvalidValue),
        od_write(RPDO0_MAP, 1, &0x2001_0020u32.to_le_bytes())
    );

    // The mapping can't change while the PDO is valid
    write_u32(RPDO0_COMM, 1, 0x205);
    assert!(NODE_STATE.rpdos()[0].valid());
    assert_eq!(Err(AbortCode::InvalidValue), od_write(RPDO0_MAP, 0, &[0]));
}

#[test]
#[serial_test::serial]
fn test_comm_write_rejections() {
    let _t = TestNode::new();

    // Reserved bits
    assert_eq!(
        Err(AbortCode::InvalidValue),
        od_write(RPDO0_COMM, 1, &(0x205u32 | 1 << 20).to_le_bytes())
    );
    // Reserved transmission types
    assert_eq!(Err(AbortCode::InvalidValue), od_write(RPDO0_COMM, 2, &[241]));
    assert_eq!(Err(AbortCode::InvalidValue), od_write(TPDO0_COMM, 2, &[253]));
    // Sub 4 of the TPDO communication object is reserved
    assert_eq!(Err(AbortCode::NoSuchSubIndex), od_write(TPDO0_COMM, 4, &[0]));
    // SYNC start above 240
    assert_eq!(Err(AbortCode::InvalidValue), od_write(TPDO0_COMM, 6, &[241]));
    // Wrong length
    assert_eq!(
        Err(AbortCode::DataTypeMismatchLengthLow),
        od_write(RPDO0_COMM, 1, &[0x05, 0x02])
    );

    configure_pdo(RPDO0_COMM, 254, &[0x2000_0020]);
    // The identifier can't change while valid, but the same value may be rewritten
    assert_eq!(
        Err(AbortCode::InvalidValue),
        od_write(RPDO0_COMM, 1, &0x206u32.to_le_bytes())
    );
    assert_eq!(Ok(()), od_write(RPDO0_COMM, 1, &0x205u32.to_le_bytes()));

    configure_pdo(TPDO0_COMM, 254, &[0x2000_0020]);
    assert_eq!(Err(AbortCode::InvalidValue), od_write(TPDO0_COMM, 6, &[1]));
}

#[test]
#[serial_test::serial]
fn test_restricted_cob_id_leaves_pdo_invalid() {
    let _t = TestNode::new();
    configure_pdo(RPDO1_COMM, 254, &[0x2000_0020]);
    assert!(NODE_STATE.rpdos()[1].valid());

    write_u32(RPDO1_COMM, 1, 0x8000_0305);
    write_u32(RPDO1_COMM, 1, 0x701);
    assert!(!NODE_STATE.rpdos()[1].valid());
    assert_eq!(0x8000_0701, read_u32(RPDO1_COMM, 1));

    // A custom identifier is not offset by the node ID
    write_u32(RPDO1_COMM, 1, 0x8000_0701);
    write_u32(RPDO1_COMM, 1, 0x222);
    assert_eq!(Some(CanId::std(0x222)), NODE_STATE.rpdos()[1].cob_id());
}

#[test]
#[serial_test::serial]
fn test_comm_restrictions() {
    let mut t = TestNode::new();
    NODE_STATE.rpdos()[0]
        .params()
        .set_restrictions(PdoRestrictions::from_bits(PdoRestrictions::COMM_LOCKED_OPERATIONAL));
    NODE_STATE.rpdos()[1]
        .params()
        .set_restrictions(PdoRestrictions::from_bits(PdoRestrictions::MAP_READ_ONLY));

    assert_eq!(Err(AbortCode::CantStoreDeviceState), od_write(RPDO0_COMM, 2, &[1]));
    assert_eq!(Err(AbortCode::ReadOnly), od_write(0x1601, 0, &[0]));

    t.node.set_nmt_state(NmtState::PreOperational);
    assert_eq!(Ok(()), od_write(RPDO0_COMM, 2, &[1]));
    assert_eq!(Err(AbortCode::ReadOnly), od_write(0x1601, 0, &[0]));
}

#[test]
#[serial_test::serial]
fn test_node_id_change_follows_default_cob_id() {
    let mut t = TestNode::new();
    configure_pdo(TPDO0_COMM, 1, &[0x2003_0108]);

    t.node
        .set_node_id(pdosync_common::NodeId::new(9).unwrap());
    assert_eq!(0x189, read_u32(TPDO0_COMM, 1));
    t.sync(None);
    assert_eq!(CanId::std(0x189), t.sent()[0].id);
}
