//! Bit layouts of the PDO parameter values
//!
//! The communication and mapping objects hold packed 32-bit words. These types give names to the
//! fields without changing the stored representation.

/// Maximum number of objects mapped to a single PDO
///
/// Without CAN-FD or sub-byte mapping, it's not possible to map more than 8 objects to a single
/// PDO.
pub const N_MAPPING_PARAMS: usize = 8;

/// A packed PDO mapping parameter: `index:16 | sub:8 | bit_length:8`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingDescriptor {
    /// Index of the mapped object
    pub index: u16,
    /// Sub index of the mapped object
    pub sub: u8,
    /// Length of the mapped value in bits
    pub bit_length: u8,
}

impl MappingDescriptor {
    /// The highest object index treated as a dummy entry when sub index is 0
    pub const MAX_DUMMY_INDEX: u16 = 7;

    /// Create a descriptor from its fields
    pub const fn new(index: u16, sub: u8, bit_length: u8) -> Self {
        Self {
            index,
            sub,
            bit_length,
        }
    }

    /// Unpack a raw mapping parameter
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            index: (raw >> 16) as u16,
            sub: (raw >> 8) as u8,
            bit_length: raw as u8,
        }
    }

    /// Pack into a raw mapping parameter
    pub const fn raw(&self) -> u32 {
        ((self.index as u32) << 16) | ((self.sub as u32) << 8) | self.bit_length as u32
    }

    /// The mapped length in bytes, or None if the bit length is not byte aligned
    pub const fn byte_length(&self) -> Option<u8> {
        if self.bit_length % 8 == 0 {
            Some(self.bit_length / 8)
        } else {
            None
        }
    }

    /// Returns true if this descriptor refers to a dummy entry rather than a real object
    pub const fn is_dummy(&self) -> bool {
        self.index <= Self::MAX_DUMMY_INDEX && self.sub == 0
    }
}

impl From<u32> for MappingDescriptor {
    fn from(value: u32) -> Self {
        Self::from_raw(value)
    }
}

impl From<MappingDescriptor> for u32 {
    fn from(value: MappingDescriptor) -> Self {
        value.raw()
    }
}

/// A COB-ID parameter word, as stored in PDO communication objects and object 0x1005
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CobIdWord(pub u32);

impl CobIdWord {
    /// Bit 31: the PDO is not valid (disabled)
    pub const INVALID: u32 = 1 << 31;
    /// Bit 30: RTR is not allowed on a PDO, or the node is SYNC producer for object 0x1005
    pub const BIT30: u32 = 1 << 30;
    /// Bit 29: a 29-bit identifier is used
    pub const EXTENDED: u32 = 1 << 29;
    /// Bits 11 to 29, which must be zero for 11-bit identifiers
    pub const RESERVED_MASK: u32 = 0x3FFF_F800;
    /// Bits 0 to 29, which may not change while a PDO is valid
    pub const ID_FIELD_MASK: u32 = 0x3FFF_FFFF;
    /// Bits 0 to 10, the identifier
    pub const STD_ID_MASK: u32 = 0x7FF;

    /// Returns true if the invalid bit is set
    pub const fn is_invalid(&self) -> bool {
        self.0 & Self::INVALID != 0
    }

    /// Returns true if bit 30 is set
    pub const fn bit30(&self) -> bool {
        self.0 & Self::BIT30 != 0
    }

    /// Returns true if the extended identifier bit is set
    pub const fn is_extended(&self) -> bool {
        self.0 & Self::EXTENDED != 0
    }

    /// Returns true if any of bits 11 to 29 are set
    pub const fn has_reserved_bits(&self) -> bool {
        self.0 & Self::RESERVED_MASK != 0
    }

    /// The 11-bit identifier
    pub const fn std_id(&self) -> u16 {
        (self.0 & Self::STD_ID_MASK) as u16
    }

    /// The low 16 bits of the word
    pub const fn low_word(&self) -> u16 {
        self.0 as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_descriptor_fields() {
        let desc = MappingDescriptor::from_raw(0x2000_0120);
        assert_eq!(0x2000, desc.index);
        assert_eq!(1, desc.sub);
        assert_eq!(32, desc.bit_length);
        assert_eq!(Some(4), desc.byte_length());
        assert_eq!(0x2000_0120, desc.raw());
        assert!(!desc.is_dummy());

        assert_eq!(None, MappingDescriptor::new(0x2000, 1, 12).byte_length());
        assert!(MappingDescriptor::new(7, 0, 32).is_dummy());
        assert!(!MappingDescriptor::new(8, 0, 32).is_dummy());
        assert!(!MappingDescriptor::new(2, 1, 8).is_dummy());
    }

    #[test]
    fn test_cob_id_word_fields() {
        let word = CobIdWord(0x8000_0181);
        assert!(word.is_invalid());
        assert!(!word.has_reserved_bits());
        assert_eq!(0x181, word.std_id());
        assert!(CobIdWord(0x0000_0800).has_reserved_bits());
        assert!(CobIdWord(CobIdWord::EXTENDED).has_reserved_bits());
        assert!(!CobIdWord(CobIdWord::BIT30 | 0x80).has_reserved_bits());
    }
}
