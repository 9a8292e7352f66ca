//! Constants defining standard object indices and special values
//!

/// Object indices for standard objects
pub mod object_ids {
    /// The SYNC COB-ID object index
    pub const SYNC_COB_ID: u16 = 0x1005;
    /// The communication cycle period object index
    pub const COMM_CYCLE_PERIOD: u16 = 0x1006;
    /// The synchronous window length object index
    pub const SYNC_WINDOW_LENGTH: u16 = 0x1007;
    /// The SYNC counter overflow value object index
    pub const SYNC_COUNTER_OVERFLOW: u16 = 0x1019;
    /// The first RPDO communication parameter object index
    pub const RPDO_COMM_BASE: u16 = 0x1400;
    /// The first RPDO mapping parameter object index
    pub const RPDO_MAP_BASE: u16 = 0x1600;
    /// The first TPDO communication parameter object index
    pub const TPDO_COMM_BASE: u16 = 0x1800;
    /// The first TPDO mapping parameter object index
    pub const TPDO_MAP_BASE: u16 = 0x1A00;
}

/// Special values used in PDO and SYNC parameters
pub mod values {
    /// The default COB-ID of the SYNC object
    pub const DEFAULT_SYNC_ID: u16 = 0x80;
    /// Base of the pre-defined RPDO identifiers; RPDO n uses `0x200 + 0x100 * n` plus node id
    pub const DEFAULT_RPDO_BASE: u16 = 0x200;
    /// Base of the pre-defined TPDO identifiers; TPDO n uses `0x180 + 0x100 * n` plus node id
    pub const DEFAULT_TPDO_BASE: u16 = 0x180;
    /// Number of PDOs in each direction which have a pre-defined identifier
    pub const N_DEFAULT_PDO_IDS: usize = 4;
    /// Highest transmission type which is synchronous (cyclic)
    pub const TRANSMISSION_TYPE_SYNC_MAX: u8 = 240;
    /// Lowest transmission type which is event driven
    pub const TRANSMISSION_TYPE_EVENT: u8 = 253;
    /// Transmission type for manufacturer specific event driven PDOs
    pub const TRANSMISSION_TYPE_EVENT_MFR: u8 = 254;
    /// Transmission type for profile specific event driven PDOs
    pub const TRANSMISSION_TYPE_EVENT_PROFILE: u8 = 255;
    /// Highest SYNC start value, and highest SYNC counter overflow value
    pub const SYNC_START_MAX: u8 = 240;

    /// Return the pre-defined COB-ID for the nth RPDO, or 0 if there is none
    pub const fn default_rpdo_cob_id(n: usize) -> u16 {
        if n < N_DEFAULT_PDO_IDS {
            DEFAULT_RPDO_BASE + 0x100 * n as u16
        } else {
            0
        }
    }

    /// Return the pre-defined COB-ID for the nth TPDO, or 0 if there is none
    pub const fn default_tpdo_cob_id(n: usize) -> u16 {
        if n < N_DEFAULT_PDO_IDS {
            DEFAULT_TPDO_BASE + 0x100 * n as u16
        } else {
            0
        }
    }

    /// Returns true for transmission types which may not be written to a PDO (241..=253)
    pub const fn is_invalid_transmission_type(transmission_type: u8) -> bool {
        transmission_type > TRANSMISSION_TYPE_SYNC_MAX
            && transmission_type < TRANSMISSION_TYPE_EVENT_MFR
    }

    /// Returns true if the 11-bit identifier is restricted by CiA 301 and may not be used for a PDO
    pub const fn is_restricted_can_id(id: u16) -> bool {
        matches!(
            id,
            0..=0x7F | 0x101..=0x180 | 0x581..=0x5FF | 0x601..=0x67F | 0x6E0..=0x6FF | 0x701..=u16::MAX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::values::*;

    #[test]
    fn test_restricted_ids() {
        assert!(is_restricted_can_id(0));
        assert!(is_restricted_can_id(0x7F));
        assert!(!is_restricted_can_id(0x80));
        assert!(!is_restricted_can_id(0x100));
        assert!(is_restricted_can_id(0x101));
        assert!(!is_restricted_can_id(0x6DF));
        assert!(is_restricted_can_id(0x6E0));
        assert!(is_restricted_can_id(0x77F));
        assert!(is_restricted_can_id(0x7FF));
        assert!(is_restricted_can_id(0x180));
        assert!(!is_restricted_can_id(0x181));
        assert!(!is_restricted_can_id(0x201));
        assert!(!is_restricted_can_id(0x580));
        assert!(is_restricted_can_id(0x5FF));
        assert!(!is_restricted_can_id(0x680));
        assert!(is_restricted_can_id(0x700 + 5));
    }

    #[test]
    fn test_transmission_type_ranges() {
        assert!(!is_invalid_transmission_type(240));
        assert!(is_invalid_transmission_type(241));
        assert!(is_invalid_transmission_type(253));
        assert!(!is_invalid_transmission_type(254));
    }

    #[test]
    fn test_default_ids() {
        assert_eq!(0x200, default_rpdo_cob_id(0));
        assert_eq!(0x480, default_tpdo_cob_id(3));
        assert_eq!(0, default_tpdo_cob_id(4));
    }
}
