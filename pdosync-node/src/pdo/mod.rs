//! Process data objects
//!
//! A PDO is a CAN frame carrying a fixed layout of object values. The layout is given by up to 8
//! mapping parameters, which are resolved into references to the mapped objects by
//! [`MappedPdo::resolve`] whenever the mapping is reconfigured.
//!
//! [`Rpdo`] and [`Tpdo`] hold the parameters and run time state of a single PDO. They are normally
//! allocated statically in a [`NodeState`](crate::NodeState), and exposed in the object dictionary
//! through the objects in this module: [`RpdoCommObject`], [`TpdoCommObject`],
//! [`RpdoMappingObject`] and [`TpdoMappingObject`].

use defmt_or_log::warn;
use pdosync_common::{
    constants::values::is_restricted_can_id,
    objects::ObjectId,
    pdo::{CobIdWord, MappingDescriptor, N_MAPPING_PARAMS},
    sdo::AbortCode,
    AtomicCell, NmtState,
};

use crate::{
    error_sink::{ErrorKind, ErrorSink},
    object_dict::ODEntry,
};

mod mapping;
mod objects;
mod rpdo;
mod tpdo;

pub use mapping::*;
pub use objects::*;
pub use rpdo::Rpdo;
pub use tpdo::Tpdo;

/// Flags limiting when the parameters of a PDO may be written through the object dictionary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PdoRestrictions(u8);

impl PdoRestrictions {
    /// Communication parameters can not be written while operational
    pub const COMM_LOCKED_OPERATIONAL: u8 = 0x01;
    /// Mapping parameters can not be written while operational
    pub const MAP_LOCKED_OPERATIONAL: u8 = 0x02;
    /// Communication parameters are read only
    pub const COMM_READ_ONLY: u8 = 0x04;
    /// Mapping parameters are read only
    pub const MAP_READ_ONLY: u8 = 0x08;

    /// No restrictions
    pub const NONE: Self = Self(0);

    /// Create from raw flag bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get the raw flag bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub(crate) fn check_comm_write(&self, nmt: NmtState) -> Result<(), AbortCode> {
        self.check(Self::COMM_READ_ONLY, Self::COMM_LOCKED_OPERATIONAL, nmt)
    }

    pub(crate) fn check_map_write(&self, nmt: NmtState) -> Result<(), AbortCode> {
        self.check(Self::MAP_READ_ONLY, Self::MAP_LOCKED_OPERATIONAL, nmt)
    }

    fn check(&self, read_only: u8, locked: u8, nmt: NmtState) -> Result<(), AbortCode> {
        if self.0 & read_only != 0 {
            Err(AbortCode::ReadOnly)
        } else if self.0 & locked != 0 && nmt == NmtState::Operational {
            Err(AbortCode::CantStoreDeviceState)
        } else {
            Ok(())
        }
    }
}

/// The stored parameters shared by receive and transmit PDOs
///
/// These are the values visible in the object dictionary. They only take effect when the PDO is
/// reconfigured, either by a write through the PDO objects or by a communication reset.
#[derive(Debug)]
pub struct PdoParams {
    /// COB-ID parameter, stored with the node ID stripped when the default ID is used
    cob_id: AtomicCell<u32>,
    transmission_type: AtomicCell<u8>,
    default_cob_id: AtomicCell<u16>,
    node_id: AtomicCell<u8>,
    restrictions: AtomicCell<PdoRestrictions>,
    mapping_count: AtomicCell<u8>,
    mapping_params: [AtomicCell<u32>; N_MAPPING_PARAMS],
}

impl PdoParams {
    pub(crate) const fn new() -> Self {
        Self {
            cob_id: AtomicCell::new(CobIdWord::INVALID),
            transmission_type: AtomicCell::new(0),
            default_cob_id: AtomicCell::new(0),
            node_id: AtomicCell::new(0),
            restrictions: AtomicCell::new(PdoRestrictions::NONE),
            mapping_count: AtomicCell::new(0),
            mapping_params: [const { AtomicCell::new(0) }; N_MAPPING_PARAMS],
        }
    }

    /// The stored COB-ID parameter
    pub fn cob_id(&self) -> u32 {
        self.cob_id.load()
    }

    /// Store the COB-ID parameter without applying it
    ///
    /// If the identifier is the default identifier plus the node ID, it is stored as the default
    /// so that it follows later node ID changes.
    pub fn set_cob_id(&self, value: u32) {
        self.cob_id.store(self.strip_node_id(value));
    }

    /// The stored transmission type
    pub fn transmission_type(&self) -> u8 {
        self.transmission_type.load()
    }

    /// Store the transmission type without applying it
    pub fn set_transmission_type(&self, value: u8) {
        self.transmission_type.store(value);
    }

    /// The restrictions on object dictionary writes
    pub fn restrictions(&self) -> PdoRestrictions {
        self.restrictions.load()
    }

    /// Set the restrictions on object dictionary writes
    pub fn set_restrictions(&self, restrictions: PdoRestrictions) {
        self.restrictions.store(restrictions);
    }

    /// The pre-defined COB-ID, or 0 if this PDO has none
    pub fn default_cob_id(&self) -> u16 {
        self.default_cob_id.load()
    }

    pub(crate) fn set_identity(&self, default_cob_id: u16, node_id: u8) {
        self.default_cob_id.store(default_cob_id);
        self.node_id.store(node_id);
    }

    /// The stored number of mapped objects
    pub fn mapping_count(&self) -> u8 {
        self.mapping_count.load()
    }

    pub(crate) fn set_mapping_count(&self, count: u8) {
        self.mapping_count.store(count);
    }

    /// Read a stored mapping parameter
    pub fn mapping_param(&self, i: usize) -> Option<u32> {
        self.mapping_params.get(i).map(|p| p.load())
    }

    /// Store the mapping parameters without applying them
    ///
    /// Parameters beyond the 8th are ignored
    pub fn set_mappings(&self, params: &[u32]) {
        for (slot, value) in self.mapping_params.iter().zip(params) {
            slot.store(*value);
        }
        self.mapping_count
            .store(params.len().min(N_MAPPING_PARAMS) as u8);
    }

    pub(crate) fn set_mapping_param(&self, i: usize, value: u32) {
        if let Some(slot) = self.mapping_params.get(i) {
            slot.store(value);
        }
    }

    /// The first `count` stored mapping parameters
    pub(crate) fn descriptors(&self, count: u8) -> impl Iterator<Item = MappingDescriptor> + '_ {
        self.mapping_params
            .iter()
            .take(count as usize)
            .map(|p| MappingDescriptor::from_raw(p.load()))
    }

    fn strip_node_id(&self, value: u32) -> u32 {
        let default = self.default_cob_id();
        if default != 0 && CobIdWord(value).low_word() == default + self.node_id.load() as u16 {
            (value & (CobIdWord::INVALID | CobIdWord::BIT30)) | default as u32
        } else {
            value
        }
    }

    /// Check a COB-ID written through the object dictionary
    ///
    /// Returns the value to store
    pub(crate) fn validate_cob_id_write(&self, value: u32, valid: bool) -> Result<u32, AbortCode> {
        if CobIdWord(value).has_reserved_bits() {
            return Err(AbortCode::InvalidValue);
        }
        let value = self.strip_node_id(value);
        if valid && (value ^ self.cob_id()) & CobIdWord::ID_FIELD_MASK != 0 {
            return Err(AbortCode::InvalidValue);
        }
        Ok(value)
    }

    /// The COB-ID as reported through the object dictionary
    pub(crate) fn reported_cob_id(&self, valid: bool) -> u32 {
        let mut value = self.cob_id();
        let default = self.default_cob_id();
        if default != 0 && CobIdWord(value).low_word() == default {
            value += self.node_id.load() as u32;
        }
        if !valid {
            value |= CobIdWord::INVALID;
        }
        value
    }

    /// Determine the identifier in use for a given COB-ID parameter and mapped length
    ///
    /// Returns None if the PDO can't be valid
    pub(crate) fn effective_id(&self, cob_id: u32, data_len: usize) -> Option<u16> {
        let word = CobIdWord(cob_id);
        let mut id = word.std_id();
        if word.is_invalid() || word.has_reserved_bits() || data_len == 0 || id == 0 {
            return None;
        }
        if id == self.default_cob_id() {
            id += self.node_id.load() as u16;
        }
        if is_restricted_can_id(id) {
            warn!("PDO can not use restricted ID 0x{:x}", id);
            return None;
        }
        Some(id)
    }
}

/// Resolve the first `count` mapping parameters, reporting a failure to the error sink
pub(crate) fn resolve_and_report(
    od: &[ODEntry<'static>],
    direction: PdoDirection,
    params: &PdoParams,
    count: u8,
    errors: &dyn ErrorSink,
) -> Result<MappedPdo, MappingError> {
    MappedPdo::resolve(od, direction, params.descriptors(count)).map_err(|e| {
        let ObjectId { index, sub } = e.object();
        warn!("Rejected PDO mapping of 0x{:x}sub{}", index, sub);
        errors.report(
            ErrorKind::PdoWrongMapping,
            ErrorKind::PdoWrongMapping.emergency_code(),
            ((index as u32) << 16) | ((sub as u32) << 8),
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(default: u16, node_id: u8) -> PdoParams {
        let params = PdoParams::new();
        params.set_identity(default, node_id);
        params
    }

    #[test]
    fn test_restrictions() {
        let r = PdoRestrictions::from_bits(PdoRestrictions::COMM_LOCKED_OPERATIONAL);
        assert_eq!(Ok(()), r.check_comm_write(NmtState::PreOperational));
        assert_eq!(
            Err(AbortCode::CantStoreDeviceState),
            r.check_comm_write(NmtState::Operational)
        );
        assert_eq!(Ok(()), r.check_map_write(NmtState::Operational));

        let r = PdoRestrictions::from_bits(PdoRestrictions::MAP_READ_ONLY);
        assert_eq!(Err(AbortCode::ReadOnly), r.check_map_write(NmtState::Stopped));
        assert_eq!(Ok(()), r.check_comm_write(NmtState::Operational));
    }

    #[test]
    fn test_default_cob_id_stored_without_node_id() {
        let p = params(0x200, 5);
        p.set_cob_id(0x205);
        assert_eq!(0x200, p.cob_id());
        assert_eq!(0x205, p.reported_cob_id(true));
        assert_eq!(0x8000_0205, p.reported_cob_id(false));
        assert_eq!(Some(0x205), p.effective_id(p.cob_id(), 4));

        p.set_cob_id(0x8000_0205);
        assert_eq!(0x8000_0200, p.cob_id());

        // A non-default ID is kept as is
        p.set_cob_id(0x301);
        assert_eq!(0x301, p.cob_id());
        assert_eq!(Some(0x301), p.effective_id(0x301, 1));
    }

    #[test]
    fn test_effective_id_validity() {
        let p = params(0x180, 1);
        assert_eq!(None, p.effective_id(0x181, 0));
        assert_eq!(None, p.effective_id(0x8000_0181, 1));
        assert_eq!(None, p.effective_id(0x2000_0181, 1));
        assert_eq!(None, p.effective_id(0, 1));
        // Restricted identifiers
        assert_eq!(None, p.effective_id(0x7F, 1));
        assert_eq!(None, p.effective_id(0x581, 1));
        assert_eq!(None, p.effective_id(0x701, 1));
        // Bit 30 is ignored
        assert_eq!(Some(0x182), p.effective_id(0x4000_0180 | 0x2, 1));
    }

    #[test]
    fn test_cob_id_write_validation() {
        let p = params(0x180, 3);
        p.set_cob_id(0x180);
        assert_eq!(Err(AbortCode::InvalidValue), p.validate_cob_id_write(0x800, false));
        assert_eq!(Ok(0x8000_0180), p.validate_cob_id_write(0x8000_0183, true));
        assert_eq!(Err(AbortCode::InvalidValue), p.validate_cob_id_write(0x190, true));
        assert_eq!(Ok(0x190), p.validate_cob_id_write(0x190, false));
    }
}
