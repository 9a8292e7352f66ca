//! Object Definitions
//!
//! Metadata describing sub objects in the object dictionary, as seen by the PDO mapping resolver.

/// A container for the address of a subobject
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectId {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
}

/// Object Code value
///
/// Defines the type of an object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectCode {
    /// An object which has a single sub object
    #[default]
    Var = 7,
    /// An array of sub-objects all with the same data type
    Array = 8,
    /// A collection of sub-objects with varying types
    Record = 9,
}

/// Access type enum
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AccessType {
    /// Read-only
    #[default]
    Ro,
    /// Write-only
    Wo,
    /// Read-write
    Rw,
    /// Read-only, and also will never be changed, even internally by the device
    Const,
}

impl AccessType {
    /// Returns true if an object with this access type can be read
    pub fn is_readable(&self) -> bool {
        matches!(self, AccessType::Ro | AccessType::Rw | AccessType::Const)
    }

    /// Returns true if an object with this access type can be written
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessType::Rw | AccessType::Wo)
    }
}

/// Possible PDO mapping values for an object
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PdoMapping {
    /// Object cannot be mapped to PDOs
    #[default]
    None,
    /// Object can be mapped to RPDOs only
    Rpdo,
    /// Object can be mapped to TPDOs only
    Tpdo,
    /// Object can be mapped to both RPDOs and TPDOs
    Both,
}

impl PdoMapping {
    /// Returns true if the object may be mapped into a receive PDO
    pub fn allows_rpdo(&self) -> bool {
        matches!(self, PdoMapping::Rpdo | PdoMapping::Both)
    }

    /// Returns true if the object may be mapped into a transmit PDO
    pub fn allows_tpdo(&self) -> bool {
        matches!(self, PdoMapping::Tpdo | PdoMapping::Both)
    }
}

/// Indicate the type of data stored in an object
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DataType {
    Boolean,
    #[default]
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Real32,
    VisibleString,
    OctetString,
    UnicodeString,
    Domain,
    Other(u16),
}

impl DataType {
    /// Returns true if data type is one of the string types
    pub fn is_str(&self) -> bool {
        matches!(
            self,
            Self::VisibleString | Self::OctetString | Self::UnicodeString
        )
    }

    /// Returns true for numeric types with more than one byte, whose byte order depends on the
    /// encoding
    pub fn is_multibyte_value(&self) -> bool {
        matches!(
            self,
            Self::Int16 | Self::Int32 | Self::UInt16 | Self::UInt32 | Self::Real32
        )
    }
}

/// Information about a sub object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubInfo {
    /// The size (or max size) of this sub object, in bytes
    pub size: usize,
    /// The data type of this sub object
    pub data_type: DataType,
    /// Indicates what accesses (i.e. read/write) are allowed on this sub object
    pub access_type: AccessType,
    /// Indicates whether this sub may be mapped to PDOs
    pub pdo_mapping: PdoMapping,
    /// When mapped to a TPDO, a change in this sub object's value requests a transmission
    pub detect_cos: bool,
}

impl SubInfo {
    /// A shorthand value for sub0 on record and array objects
    pub const MAX_SUB_NUMBER: SubInfo = SubInfo {
        size: 1,
        data_type: DataType::UInt8,
        access_type: AccessType::Const,
        pdo_mapping: PdoMapping::None,
        detect_cos: false,
    };

    const fn new_sized(size: usize, data_type: DataType) -> Self {
        Self {
            size,
            data_type,
            access_type: AccessType::Ro,
            pdo_mapping: PdoMapping::None,
            detect_cos: false,
        }
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_u32() -> Self {
        Self::new_sized(4, DataType::UInt32)
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_u16() -> Self {
        Self::new_sized(2, DataType::UInt16)
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_u8() -> Self {
        Self::new_sized(1, DataType::UInt8)
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_i32() -> Self {
        Self::new_sized(4, DataType::Int32)
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_i16() -> Self {
        Self::new_sized(2, DataType::Int16)
    }

    /// Convenience function for creating a new sub-info by type
    pub const fn new_octet_str(size: usize) -> Self {
        Self::new_sized(size, DataType::OctetString)
    }

    /// Convenience function to set the access_type to read-only
    pub const fn ro_access(mut self) -> Self {
        self.access_type = AccessType::Ro;
        self
    }

    /// Convenience function to set the access_type to read-write
    pub const fn rw_access(mut self) -> Self {
        self.access_type = AccessType::Rw;
        self
    }

    /// Convenience function to set the access_type to const
    pub const fn const_access(mut self) -> Self {
        self.access_type = AccessType::Const;
        self
    }

    /// Convenience function to set the access_type to write-only
    pub const fn wo_access(mut self) -> Self {
        self.access_type = AccessType::Wo;
        self
    }

    /// Convenience function to set the PDO mapping permission
    pub const fn pdo_mapping(mut self, mapping: PdoMapping) -> Self {
        self.pdo_mapping = mapping;
        self
    }

    /// Convenience function to enable change-of-state detection for TPDOs
    pub const fn detect_cos(mut self, value: bool) -> Self {
        self.detect_cos = value;
        self
    }

    /// Returns true if this sub object holds a multi-byte numeric value
    pub fn is_multibyte(&self) -> bool {
        self.size > 1 && self.data_type.is_multibyte_value()
    }
}
