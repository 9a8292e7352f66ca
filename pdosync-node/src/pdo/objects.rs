//! Object dictionary access to the PDO parameters
//!
//! The communication objects (0x1400+n, 0x1800+n) and mapping objects (0x1600+n, 0x1A00+n) are
//! implemented here. Writes are validated and applied to the running PDO immediately.

use pdosync_common::{
    constants::values::{is_invalid_transmission_type, SYNC_START_MAX},
    objects::{ObjectCode, SubInfo},
    pdo::{MappingDescriptor, N_MAPPING_PARAMS},
    sdo::AbortCode,
};

use super::{resolve_entry, MappingError, PdoDirection, PdoParams, Rpdo, Tpdo};
use crate::{
    error_sink::ErrorSink,
    node_state::NodeStateAccess,
    object_dict::{
        read_value_bytes, u16_from_data, u32_from_data, u8_from_data, ODEntry, ObjectAccess,
    },
};

const RPDO_COMM_SUBS: u8 = 2;
const TPDO_COMM_SUBS: u8 = 6;

/// Implements the communication parameter object for an RPDO
#[allow(missing_debug_implementations)]
pub struct RpdoCommObject {
    node: &'static dyn NodeStateAccess,
    n: usize,
}

impl RpdoCommObject {
    /// Create a communication object for the `n`th RPDO of `node`
    pub const fn new(node: &'static dyn NodeStateAccess, n: usize) -> Self {
        Self { node, n }
    }

    fn rpdo(&self) -> Result<&Rpdo, AbortCode> {
        self.node
            .rpdos()
            .get(self.n)
            .ok_or(AbortCode::ResourceNotAvailable)
    }
}

impl ObjectAccess for RpdoCommObject {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        let rpdo = self.rpdo()?;
        match sub {
            0 => read_value_bytes(&[RPDO_COMM_SUBS], offset, buf),
            1 => {
                let cob_id = rpdo.params().reported_cob_id(rpdo.valid());
                read_value_bytes(&cob_id.to_le_bytes(), offset, buf)
            }
            2 => read_value_bytes(&[rpdo.params().transmission_type()], offset, buf),
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(self.sub_info(sub)?.size)
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        if !self.sub_info(sub)?.access_type.is_writable() {
            return Err(AbortCode::ReadOnly);
        }
        let rpdo = self.rpdo()?;
        rpdo.params()
            .restrictions()
            .check_comm_write(self.node.nmt_state())?;
        match sub {
            1 => {
                let value = rpdo
                    .params()
                    .validate_cob_id_write(u32_from_data(data)?, rpdo.valid())?;
                rpdo.params().set_cob_id(value);
                rpdo.configure_communication(value);
                Ok(())
            }
            2 => {
                let transmission_type = u8_from_data(data)?;
                if is_invalid_transmission_type(transmission_type) {
                    return Err(AbortCode::InvalidValue);
                }
                rpdo.apply_transmission_type(transmission_type);
                Ok(())
            }
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Record
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        match sub {
            0 => Ok(SubInfo::MAX_SUB_NUMBER),
            1 => Ok(SubInfo::new_u32().rw_access()),
            2 => Ok(SubInfo::new_u8().rw_access()),
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }
}

/// Implements the communication parameter object for a TPDO
#[allow(missing_debug_implementations)]
pub struct TpdoCommObject {
    node: &'static dyn NodeStateAccess,
    n: usize,
}

impl TpdoCommObject {
    /// Create a communication object for the `n`th TPDO of `node`
    pub const fn new(node: &'static dyn NodeStateAccess, n: usize) -> Self {
        Self { node, n }
    }

    fn tpdo(&self) -> Result<&Tpdo, AbortCode> {
        self.node
            .tpdos()
            .get(self.n)
            .ok_or(AbortCode::ResourceNotAvailable)
    }
}

impl ObjectAccess for TpdoCommObject {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        let tpdo = self.tpdo()?;
        match sub {
            0 => read_value_bytes(&[TPDO_COMM_SUBS], offset, buf),
            1 => {
                let cob_id = tpdo.params().reported_cob_id(tpdo.valid());
                read_value_bytes(&cob_id.to_le_bytes(), offset, buf)
            }
            2 => read_value_bytes(&[tpdo.params().transmission_type()], offset, buf),
            3 => read_value_bytes(&tpdo.inhibit_time().to_le_bytes(), offset, buf),
            5 => read_value_bytes(&tpdo.event_time().to_le_bytes(), offset, buf),
            6 => read_value_bytes(&[tpdo.sync_start()], offset, buf),
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(self.sub_info(sub)?.size)
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        if !self.sub_info(sub)?.access_type.is_writable() {
            return Err(AbortCode::ReadOnly);
        }
        let tpdo = self.tpdo()?;
        tpdo.params()
            .restrictions()
            .check_comm_write(self.node.nmt_state())?;
        match sub {
            1 => {
                let value = tpdo
                    .params()
                    .validate_cob_id_write(u32_from_data(data)?, tpdo.valid())?;
                tpdo.apply_cob_id(value);
                Ok(())
            }
            2 => {
                let transmission_type = u8_from_data(data)?;
                if is_invalid_transmission_type(transmission_type) {
                    return Err(AbortCode::InvalidValue);
                }
                tpdo.apply_transmission_type(transmission_type);
                Ok(())
            }
            3 => {
                let value = u16_from_data(data)?;
                if tpdo.valid() {
                    return Err(AbortCode::InvalidValue);
                }
                tpdo.apply_inhibit_time(value);
                Ok(())
            }
            5 => {
                tpdo.apply_event_time(u16_from_data(data)?);
                Ok(())
            }
            6 => {
                let value = u8_from_data(data)?;
                if tpdo.valid() || value > SYNC_START_MAX {
                    return Err(AbortCode::InvalidValue);
                }
                tpdo.set_sync_start(value);
                Ok(())
            }
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Record
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        match sub {
            0 => Ok(SubInfo::MAX_SUB_NUMBER),
            1 => Ok(SubInfo::new_u32().rw_access()),
            2 | 6 => Ok(SubInfo::new_u8().rw_access()),
            3 | 5 => Ok(SubInfo::new_u16().rw_access()),
            _ => Err(AbortCode::NoSuchSubIndex),
        }
    }
}

/// Common access to the mapping of receive and transmit PDOs
trait MappablePdo {
    const DIRECTION: PdoDirection;

    fn params(&self) -> &PdoParams;
    fn valid(&self) -> bool;
    fn data_len(&self) -> usize;
    fn configure_mapping(
        &self,
        od: &[ODEntry<'static>],
        count: u8,
        errors: &dyn ErrorSink,
    ) -> Result<(), MappingError>;
}

impl MappablePdo for Rpdo {
    const DIRECTION: PdoDirection = PdoDirection::Receive;

    fn params(&self) -> &PdoParams {
        Rpdo::params(self)
    }

    fn valid(&self) -> bool {
        Rpdo::valid(self)
    }

    fn data_len(&self) -> usize {
        Rpdo::data_len(self)
    }

    fn configure_mapping(
        &self,
        od: &[ODEntry<'static>],
        count: u8,
        errors: &dyn ErrorSink,
    ) -> Result<(), MappingError> {
        Rpdo::configure_mapping(self, od, count, errors)
    }
}

impl MappablePdo for Tpdo {
    const DIRECTION: PdoDirection = PdoDirection::Transmit;

    fn params(&self) -> &PdoParams {
        Tpdo::params(self)
    }

    fn valid(&self) -> bool {
        Tpdo::valid(self)
    }

    fn data_len(&self) -> usize {
        Tpdo::data_len(self)
    }

    fn configure_mapping(
        &self,
        od: &[ODEntry<'static>],
        count: u8,
        errors: &dyn ErrorSink,
    ) -> Result<(), MappingError> {
        Tpdo::configure_mapping(self, od, count, errors)
    }
}

fn mapping_sub_info(sub: u8) -> Result<SubInfo, AbortCode> {
    match sub {
        0 => Ok(SubInfo::new_u8().rw_access()),
        1..=8 => Ok(SubInfo::new_u32().rw_access()),
        _ => Err(AbortCode::NoSuchSubIndex),
    }
}

fn read_mapping(
    pdo: &impl MappablePdo,
    sub: u8,
    offset: usize,
    buf: &mut [u8],
) -> Result<usize, AbortCode> {
    match sub {
        0 => {
            let count = if pdo.data_len() == 0 {
                0
            } else {
                pdo.params().mapping_count()
            };
            read_value_bytes(&[count], offset, buf)
        }
        1..=8 => {
            let value = pdo
                .params()
                .mapping_param(sub as usize - 1)
                .ok_or(AbortCode::NoSuchSubIndex)?;
            read_value_bytes(&value.to_le_bytes(), offset, buf)
        }
        _ => Err(AbortCode::NoSuchSubIndex),
    }
}

fn write_mapping<P: MappablePdo>(
    pdo: &P,
    node: &dyn NodeStateAccess,
    sub: u8,
    data: &[u8],
) -> Result<(), AbortCode> {
    mapping_sub_info(sub)?;
    pdo.params()
        .restrictions()
        .check_map_write(node.nmt_state())?;
    if pdo.valid() {
        return Err(AbortCode::InvalidValue);
    }
    let od = node.od().ok_or(AbortCode::ResourceNotAvailable)?;
    if sub == 0 {
        let count = u8_from_data(data)?;
        if count as usize > N_MAPPING_PARAMS {
            return Err(AbortCode::ValueTooHigh);
        }
        pdo.configure_mapping(od, count, node.errors())?;
        pdo.params().set_mapping_count(count);
    } else {
        let value = u32_from_data(data)?;
        if pdo.data_len() != 0 {
            return Err(AbortCode::InvalidValue);
        }
        resolve_entry(od, MappingDescriptor::from_raw(value), P::DIRECTION, 0)?;
        pdo.params().set_mapping_param(sub as usize - 1, value);
    }
    Ok(())
}

/// Implements the mapping parameter object for an RPDO
#[allow(missing_debug_implementations)]
pub struct RpdoMappingObject {
    node: &'static dyn NodeStateAccess,
    n: usize,
}

impl RpdoMappingObject {
    /// Create a mapping object for the `n`th RPDO of `node`
    pub const fn new(node: &'static dyn NodeStateAccess, n: usize) -> Self {
        Self { node, n }
    }

    fn rpdo(&self) -> Result<&Rpdo, AbortCode> {
        self.node
            .rpdos()
            .get(self.n)
            .ok_or(AbortCode::ResourceNotAvailable)
    }
}

impl ObjectAccess for RpdoMappingObject {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        read_mapping(self.rpdo()?, sub, offset, buf)
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(mapping_sub_info(sub)?.size)
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        write_mapping(self.rpdo()?, self.node, sub, data)
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Record
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        mapping_sub_info(sub)
    }

    fn max_sub_number(&self) -> u8 {
        N_MAPPING_PARAMS as u8
    }
}

/// Implements the mapping parameter object for a TPDO
#[allow(missing_debug_implementations)]
pub struct TpdoMappingObject {
    node: &'static dyn NodeStateAccess,
    n: usize,
}

impl TpdoMappingObject {
    /// Create a mapping object for the `n`th TPDO of `node`
    pub const fn new(node: &'static dyn NodeStateAccess, n: usize) -> Self {
        Self { node, n }
    }

    fn tpdo(&self) -> Result<&Tpdo, AbortCode> {
        self.node
            .tpdos()
            .get(self.n)
            .ok_or(AbortCode::ResourceNotAvailable)
    }
}

impl ObjectAccess for TpdoMappingObject {
    fn read(&self, sub: u8, offset: usize, buf: &mut [u8]) -> Result<usize, AbortCode> {
        read_mapping(self.tpdo()?, sub, offset, buf)
    }

    fn read_size(&self, sub: u8) -> Result<usize, AbortCode> {
        Ok(mapping_sub_info(sub)?.size)
    }

    fn write(&self, sub: u8, data: &[u8]) -> Result<(), AbortCode> {
        write_mapping(self.tpdo()?, self.node, sub, data)
    }

    fn object_code(&self) -> ObjectCode {
        ObjectCode::Record
    }

    fn sub_info(&self, sub: u8) -> Result<SubInfo, AbortCode> {
        mapping_sub_info(sub)
    }

    fn max_sub_number(&self) -> u8 {
        N_MAPPING_PARAMS as u8
    }
}
