//! Device config file
//!
//! A DeviceConfig is created from a TOML file, and provides the start-up values of the PDO and
//! SYNC parameters of a node. After start-up the same parameters can be changed through the
//! object dictionary.
//!
//! # An example TOML file
//!
//! ```toml
//! node_id = 5
//!
//! # SYNC parameters (objects 0x1005, 0x1006, 0x1007, 0x1019)
//! [sync]
//! # Set bit 30 to make this node the SYNC producer
//! cob_id = 0x40000080
//! period_us = 10000
//! window_us = 5000
//! counter_overflow = 0
//!
//! # Receive PDOs, in order. RPDO0 parameters are stored in 0x1400/0x1600, etc.
//! [[rpdos]]
//! # When cob_id is omitted, the pre-defined identifier for the PDO number is used
//! transmission_type = 254
//! mappings = [0x20000120]
//!
//! # Transmit PDOs, in order. TPDO0 parameters are stored in 0x1800/0x1A00, etc.
//! [[tpdos]]
//! cob_id = 0x185
//! transmission_type = 1
//! inhibit_time = 0
//! event_timer = 0
//! sync_start = 0
//! mappings = [0x20010010, 0x20020008]
//! ```
//!
//! # COB-IDs
//!
//! The `cob_id` fields use the layout of the communication objects: bit 31 set disables the PDO,
//! and bits 0-10 are the identifier. A value whose identifier equals the pre-defined identifier
//! plus node ID is stored as the pre-defined identifier, so it follows later node ID changes.
//!
//! # Restrictions
//!
//! Each PDO may set `restrictions`, a bit field limiting dictionary access to its parameters:
//!
//! | Bit | Meaning |
//! | --- | ------- |
//! | 0   | Communication parameters can not be written while operational |
//! | 1   | Mapping parameters can not be written while operational |
//! | 2   | Communication parameters are read-only |
//! | 3   | Mapping parameters are read-only |
use serde::Deserialize;

use snafu::ResultExt as _;
use snafu::Snafu;

use crate::constants::values::{is_invalid_transmission_type, DEFAULT_SYNC_ID, SYNC_START_MAX};
use crate::pdo::N_MAPPING_PARAMS;

/// Error returned when loading a device config fails
#[derive(Debug, Snafu)]
pub enum LoadError {
    /// An IO error occured while reading the file
    #[snafu(display("IO error: {source}"))]
    Io {
        /// The underlying IO error
        source: std::io::Error,
    },
    /// An error occured in the TOML parser
    #[snafu(display("Toml parse error: {source}"))]
    TomlParsing {
        /// The toml error which led to this error
        source: toml::de::Error,
    },
    /// The node ID is out of range
    #[snafu(display("Invalid node ID {value}. Must be 1-127, or 255 for unconfigured"))]
    InvalidNodeId {
        /// The configured value
        value: u8,
    },
    /// A PDO has more mappings than fit in a single PDO
    #[snafu(display("{pdo} has {count} mappings, but at most 8 are allowed"))]
    TooManyMappings {
        /// Name of the offending PDO, e.g. "TPDO2"
        pdo: String,
        /// Number of mappings configured
        count: usize,
    },
    /// A PDO uses a reserved transmission type
    #[snafu(display("{pdo} has invalid transmission type {value}"))]
    InvalidTransmissionType {
        /// Name of the offending PDO
        pdo: String,
        /// The configured value
        value: u8,
    },
    /// A TPDO SYNC start value is out of range
    #[snafu(display("{pdo} has invalid SYNC start value {value}"))]
    InvalidSyncStart {
        /// Name of the offending PDO
        pdo: String,
        /// The configured value
        value: u8,
    },
    /// The SYNC counter overflow value is out of range
    #[snafu(display("Invalid SYNC counter overflow {value}. Must be 0 or 2-240"))]
    InvalidCounterOverflow {
        /// The configured value
        value: u8,
    },
}

fn default_node_id() -> u8 {
    255
}

fn default_sync_cob_id() -> u32 {
    DEFAULT_SYNC_ID as u32
}

fn default_transmission_type() -> u8 {
    254
}

/// SYNC parameters
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Value for object 0x1005
    #[serde(default = "default_sync_cob_id")]
    pub cob_id: u32,
    /// Value for object 0x1006, in microseconds
    #[serde(default)]
    pub period_us: u32,
    /// Value for object 0x1007, in microseconds
    #[serde(default)]
    pub window_us: u32,
    /// Value for object 0x1019
    #[serde(default)]
    pub counter_overflow: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cob_id: default_sync_cob_id(),
            period_us: 0,
            window_us: 0,
            counter_overflow: 0,
        }
    }
}

/// Start-up parameters of a receive PDO
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RpdoConfig {
    /// Value for sub 1 of the communication object. None selects the pre-defined identifier.
    #[serde(default)]
    pub cob_id: Option<u32>,
    /// Value for sub 2 of the communication object
    #[serde(default = "default_transmission_type")]
    pub transmission_type: u8,
    /// Mapping parameters, in order
    #[serde(default)]
    pub mappings: Vec<u32>,
    /// Access restriction flags
    #[serde(default)]
    pub restrictions: u8,
}

/// Start-up parameters of a transmit PDO
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TpdoConfig {
    /// Value for sub 1 of the communication object. None selects the pre-defined identifier.
    #[serde(default)]
    pub cob_id: Option<u32>,
    /// Value for sub 2 of the communication object
    #[serde(default = "default_transmission_type")]
    pub transmission_type: u8,
    /// Minimum time between transmissions, in units of 100us
    #[serde(default)]
    pub inhibit_time: u16,
    /// Event timer period in ms, 0 to disable
    #[serde(default)]
    pub event_timer: u16,
    /// SYNC counter value on which the first transmission occurs, 0 to disable
    #[serde(default)]
    pub sync_start: u8,
    /// Mapping parameters, in order
    #[serde(default)]
    pub mappings: Vec<u32>,
    /// Access restriction flags
    #[serde(default)]
    pub restrictions: u8,
}

/// Start-up configuration of the PDO and SYNC parameters of a node
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// The node ID, 1-127, or 255 for an unconfigured node
    #[serde(default = "default_node_id")]
    pub node_id: u8,
    /// SYNC parameters
    #[serde(default)]
    pub sync: SyncConfig,
    /// Receive PDOs
    #[serde(default)]
    pub rpdos: Vec<RpdoConfig>,
    /// Transmit PDOs
    #[serde(default)]
    pub tpdos: Vec<TpdoConfig>,
}

impl DeviceConfig {
    /// Try to read a device config from a file
    pub fn load(config_path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
        let config_str = std::fs::read_to_string(&config_path).context(IoSnafu)?;
        Self::load_from_str(&config_str)
    }

    /// Try to read a config from a &str
    pub fn load_from_str(config_str: &str) -> Result<Self, LoadError> {
        let config: DeviceConfig = toml::from_str(config_str).context(TomlParsingSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LoadError> {
        if !(1..=127).contains(&self.node_id) && self.node_id != 255 {
            return InvalidNodeIdSnafu {
                value: self.node_id,
            }
            .fail();
        }

        let overflow = self.sync.counter_overflow;
        if overflow == 1 || overflow > SYNC_START_MAX {
            return InvalidCounterOverflowSnafu { value: overflow }.fail();
        }

        for (i, rpdo) in self.rpdos.iter().enumerate() {
            let pdo = format!("RPDO{i}");
            Self::validate_pdo(&pdo, rpdo.transmission_type, rpdo.mappings.len())?;
        }

        for (i, tpdo) in self.tpdos.iter().enumerate() {
            let pdo = format!("TPDO{i}");
            Self::validate_pdo(&pdo, tpdo.transmission_type, tpdo.mappings.len())?;
            if tpdo.sync_start > SYNC_START_MAX {
                return InvalidSyncStartSnafu {
                    pdo,
                    value: tpdo.sync_start,
                }
                .fail();
            }
        }

        Ok(())
    }

    fn validate_pdo(pdo: &str, transmission_type: u8, count: usize) -> Result<(), LoadError> {
        if count > N_MAPPING_PARAMS {
            return TooManyMappingsSnafu { pdo, count }.fail();
        }
        if is_invalid_transmission_type(transmission_type) {
            return InvalidTransmissionTypeSnafu {
                pdo,
                value: transmission_type,
            }
            .fail();
        }
        Ok(())
    }
}
