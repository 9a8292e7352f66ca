//! Node ID type
use snafu::Snafu;

/// The node ID of a CANopen node
///
/// Configured node IDs are in the range 1..=127. The special value 255 represents a node which has
/// not yet been assigned an ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    /// No node ID has been assigned
    Unconfigured,
    /// A valid node ID
    Configured(ConfiguredId),
}

/// A node ID in the range 1..=127
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredId(u8);

impl ConfiguredId {
    /// Create a configured ID, failing if the value is out of range
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value > 0 && value < 128 {
            Ok(ConfiguredId(value))
        } else {
            Err(InvalidNodeIdError { value })
        }
    }

    /// Get the ID value
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

/// Error returned for out of range node IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("Invalid node ID {value}"))]
pub struct InvalidNodeIdError {
    value: u8,
}

impl NodeId {
    /// Create a node ID from a raw value. 255 creates an unconfigured ID.
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value == 255 {
            Ok(NodeId::Unconfigured)
        } else {
            match ConfiguredId::new(value) {
                Ok(id) => Ok(NodeId::Configured(id)),
                Err(e) => Err(e),
            }
        }
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u8 {
        match self {
            NodeId::Unconfigured => 255,
            NodeId::Configured(id) => id.0,
        }
    }

    /// The value added to default PDO COB-IDs
    ///
    /// This is zero for an unconfigured node
    pub const fn cob_id_offset(&self) -> u8 {
        match self {
            NodeId::Unconfigured => 0,
            NodeId::Configured(id) => id.0,
        }
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_range() {
        assert!(NodeId::new(0).is_err());
        assert!(NodeId::new(128).is_err());
        assert_eq!(NodeId::Unconfigured, NodeId::new(255).unwrap());
        assert_eq!(0, NodeId::Unconfigured.cob_id_offset());
        assert_eq!(127, NodeId::new(127).unwrap().cob_id_offset());
    }
}
