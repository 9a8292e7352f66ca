//! Resolution of PDO mapping parameters into object references
//!
//! Each mapping parameter names an object sub index and a length in bits. Resolving a mapping
//! checks that the object exists, that it may be mapped in the direction of the PDO, and that it is
//! large enough, and produces a [`MappedTarget`] which can be used to copy bytes to or from the
//! object without repeating the lookup on every frame.
//!
//! Mapping parameters with index 1 to 7 and sub index 0 are dummy entries. They occupy space in the
//! PDO but are not backed by an object: received bytes are discarded and transmitted bytes are
//! whatever was last stored in a shared scratch area.

use core::fmt;

use defmt_or_log::warn;
use heapless::Vec;
use pdosync_common::{
    objects::ObjectId,
    pdo::{MappingDescriptor, N_MAPPING_PARAMS},
    sdo::AbortCode,
    AtomicCell,
};
use snafu::Snafu;

use crate::object_dict::{find_object, ODEntry, ObjectAccess};

/// Maximum number of data bytes in a PDO
pub const MAX_PDO_LENGTH: usize = 8;

/// Scratch storage for received dummy entries
static DUMMY_RX: AtomicCell<[u8; 4]> = AtomicCell::new([0; 4]);
/// Source for transmitted dummy entries
static DUMMY_TX: AtomicCell<[u8; 4]> = AtomicCell::new([0; 4]);

/// The direction of a PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdoDirection {
    /// Receive PDO: frame bytes are written into objects
    Receive,
    /// Transmit PDO: object bytes are read into frames
    Transmit,
}

/// Error returned when a mapping parameter can not be resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum MappingError {
    /// The object can't be mapped in this direction, the length is not whole bytes, or the object
    /// is smaller than the mapped length
    #[snafu(display("Object 0x{index:x}sub{sub} can not be mapped"))]
    NotMappable {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
    /// The total mapped length would exceed 8 bytes
    #[snafu(display("Mapping 0x{index:x}sub{sub} exceeds the PDO length"))]
    MappingLengthExceeded {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
    /// The object or sub object does not exist
    #[snafu(display("Object 0x{index:x}sub{sub} does not exist"))]
    ObjectNotFound {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
}

impl MappingError {
    /// The mapped object which caused the error
    pub const fn object(&self) -> ObjectId {
        match *self {
            MappingError::NotMappable { index, sub }
            | MappingError::MappingLengthExceeded { index, sub }
            | MappingError::ObjectNotFound { index, sub } => ObjectId { index, sub },
        }
    }

    /// The SDO abort code corresponding to this error
    pub const fn abort_code(&self) -> AbortCode {
        match self {
            MappingError::NotMappable { .. } => AbortCode::UnnallowedPdo,
            MappingError::MappingLengthExceeded { .. } => AbortCode::PdoTooLong,
            MappingError::ObjectNotFound { .. } => AbortCode::NoSuchObject,
        }
    }
}

impl From<MappingError> for AbortCode {
    fn from(value: MappingError) -> Self {
        value.abort_code()
    }
}

/// The size in bytes of the dummy entry for the given data type index
///
/// Boolean has no whole byte size, so index 1 can not be mapped.
pub const fn dummy_size(index: u16) -> u8 {
    match index {
        0 | 1 => 0,
        2 | 5 => 1,
        3 | 6 => 2,
        _ => 4,
    }
}

/// The destination or source of one mapped entry of a PDO
#[derive(Clone, Copy)]
pub enum MappedTarget {
    /// A sub object in the object dictionary
    Object {
        /// The object
        object: &'static dyn ObjectAccess,
        /// The address of the sub object
        id: ObjectId,
        /// Number of bytes mapped
        len: u8,
        /// The object holds a multi-byte numeric value
        multibyte: bool,
    },
    /// A dummy entry
    Dummy {
        /// The PDO direction
        direction: PdoDirection,
        /// Number of bytes mapped
        len: u8,
    },
}

impl fmt::Debug for MappedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object {
                id, len, multibyte, ..
            } => f
                .debug_struct("Object")
                .field("id", id)
                .field("len", len)
                .field("multibyte", multibyte)
                .finish(),
            Self::Dummy { direction, len } => f
                .debug_struct("Dummy")
                .field("direction", direction)
                .field("len", len)
                .finish(),
        }
    }
}

impl MappedTarget {
    /// Number of PDO bytes occupied by this entry
    pub fn len(&self) -> usize {
        match self {
            Self::Object { len, .. } | Self::Dummy { len, .. } => *len as usize,
        }
    }

    /// Returns true if the entry occupies no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the mapped object holds a multi-byte number
    pub fn is_multibyte(&self) -> bool {
        matches!(self, Self::Object { multibyte: true, .. })
    }

    /// Copy the current value into `buf`, which must be `self.len()` bytes long
    pub(crate) fn read(&self, buf: &mut [u8]) -> Result<(), AbortCode> {
        match self {
            Self::Object { object, id, .. } => object.read(id.sub, 0, buf).map(|_| ()),
            Self::Dummy { .. } => {
                let scratch = DUMMY_TX.load();
                buf.copy_from_slice(&scratch[..buf.len()]);
                Ok(())
            }
        }
    }

    /// Write received bytes, which must be `self.len()` long, to the target
    pub(crate) fn write(&self, data: &[u8]) -> Result<(), AbortCode> {
        match self {
            Self::Object { object, id, .. } => object.write_prefix(id.sub, data),
            Self::Dummy { .. } => {
                let _ = DUMMY_RX.fetch_update(|mut scratch| {
                    scratch[..data.len()].copy_from_slice(data);
                    Some(scratch)
                });
                Ok(())
            }
        }
    }
}

/// The result of resolving a single mapping parameter
#[derive(Clone, Copy, Debug)]
pub struct ResolvedEntry {
    /// Where the bytes go to or come from
    pub target: MappedTarget,
    /// The PDO length after appending this entry
    pub total_len: usize,
    /// Change-of-state flags for the bytes this entry occupies
    pub cos_flags: u8,
}

/// Resolve a single mapping parameter
///
/// `mapped_len` is the number of PDO bytes already occupied by previous entries. The returned
/// entry occupies bytes `mapped_len..total_len`.
pub fn resolve_entry(
    od: &[ODEntry<'static>],
    descriptor: MappingDescriptor,
    direction: PdoDirection,
    mapped_len: usize,
) -> Result<ResolvedEntry, MappingError> {
    let MappingDescriptor { index, sub, .. } = descriptor;
    let len = descriptor
        .byte_length()
        .ok_or(MappingError::NotMappable { index, sub })?;
    let total_len = mapped_len + len as usize;
    if total_len > MAX_PDO_LENGTH {
        return MappingLengthExceededSnafu { index, sub }.fail();
    }

    if descriptor.is_dummy() {
        if dummy_size(index) < len {
            return NotMappableSnafu { index, sub }.fail();
        }
        return Ok(ResolvedEntry {
            target: MappedTarget::Dummy { direction, len },
            total_len,
            cos_flags: 0,
        });
    }

    let object = find_object(od, index).ok_or(MappingError::ObjectNotFound { index, sub })?;
    if sub > object.max_sub_number() {
        return ObjectNotFoundSnafu { index, sub }.fail();
    }
    let info = object
        .sub_info(sub)
        .map_err(|_| MappingError::ObjectNotFound { index, sub })?;

    let allowed = match direction {
        PdoDirection::Receive => info.access_type.is_writable() && info.pdo_mapping.allows_rpdo(),
        PdoDirection::Transmit => info.access_type.is_readable() && info.pdo_mapping.allows_tpdo(),
    };
    if !allowed || info.size < len as usize {
        return NotMappableSnafu { index, sub }.fail();
    }

    let cos_flags = if direction == PdoDirection::Transmit && info.detect_cos {
        byte_mask(mapped_len, total_len)
    } else {
        0
    };

    Ok(ResolvedEntry {
        target: MappedTarget::Object {
            object,
            id: ObjectId { index, sub },
            len,
            multibyte: info.is_multibyte(),
        },
        total_len,
        cos_flags,
    })
}

/// A bit mask with bits `start..end` set
fn byte_mask(start: usize, end: usize) -> u8 {
    (start..end).fold(0, |mask, i| mask | (1 << i))
}

/// The resolved mapping of a PDO
#[derive(Clone, Debug, Default)]
pub struct MappedPdo {
    targets: Vec<MappedTarget, N_MAPPING_PARAMS>,
    data_len: u8,
    cos_flags: u8,
}

impl MappedPdo {
    /// An empty mapping
    pub const fn new() -> Self {
        Self {
            targets: Vec::new(),
            data_len: 0,
            cos_flags: 0,
        }
    }

    /// Resolve a list of mapping parameters
    ///
    /// Fails with the first entry which can't be resolved
    pub fn resolve(
        od: &[ODEntry<'static>],
        direction: PdoDirection,
        descriptors: impl IntoIterator<Item = MappingDescriptor>,
    ) -> Result<Self, MappingError> {
        let mut mapping = Self::new();
        for descriptor in descriptors {
            let entry = resolve_entry(od, descriptor, direction, mapping.data_len as usize)?;
            mapping
                .targets
                .push(entry.target)
                .map_err(|_| MappingError::MappingLengthExceeded {
                    index: descriptor.index,
                    sub: descriptor.sub,
                })?;
            mapping.data_len = entry.total_len as u8;
            mapping.cos_flags |= entry.cos_flags;
        }
        Ok(mapping)
    }

    /// Total number of mapped bytes
    pub fn data_len(&self) -> usize {
        self.data_len as usize
    }

    /// Bit n is set if byte n of the PDO should trigger a transmission when it changes
    pub fn cos_flags(&self) -> u8 {
        self.cos_flags
    }

    /// The mapped entries, in PDO byte order
    pub fn targets(&self) -> &[MappedTarget] {
        &self.targets
    }

    /// Returns true if nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Read the current values of all mapped objects into `buf`
    ///
    /// Returns the number of bytes gathered
    pub fn gather(&self, buf: &mut [u8; MAX_PDO_LENGTH]) -> usize {
        let mut offset = 0;
        for target in &self.targets {
            let len = target.len();
            // Mapped objects are checked to be readable and large enough, so this only fails if
            // an application object misbehaves. The previous bytes are kept in that case.
            if target.read(&mut buf[offset..offset + len]).is_err() {
                warn!("Failed reading mapped object for TPDO");
            }
            offset += len;
        }
        offset
    }

    /// Write received PDO bytes into all mapped objects
    pub fn scatter(&self, data: &[u8; MAX_PDO_LENGTH]) {
        let mut offset = 0;
        for target in &self.targets {
            let len = target.len();
            if target.write(&data[offset..offset + len]).is_err() {
                warn!("Failed writing mapped object from RPDO");
            }
            offset += len;
        }
    }
}
