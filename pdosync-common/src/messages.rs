//! CAN frame types and the message formats used by the PDO/SYNC core
use snafu::Snafu;

/// A CAN identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CanId {
    /// A 29-bit extended identifier
    Extended(u32),
    /// An 11-bit standard identifier
    Std(u16),
}

impl CanId {
    /// Create an extended identifier
    pub const fn extended(id: u32) -> CanId {
        CanId::Extended(id)
    }

    /// Create a standard identifier
    pub const fn std(id: u16) -> CanId {
        CanId::Std(id)
    }

    /// Get the raw identifier value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Extended(id) => *id,
            CanId::Std(id) => *id as u32,
        }
    }

    /// Returns true for extended identifiers
    pub fn is_extended(&self) -> bool {
        match self {
            CanId::Extended(_) => true,
            CanId::Std(_) => false,
        }
    }
}

/// The largest payload of a classic CAN frame
pub const MAX_DATA_LENGTH: usize = 8;

/// A classic CAN data frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanMessage {
    /// The payload buffer. Only the first `dlc` bytes are meaningful.
    pub data: [u8; MAX_DATA_LENGTH],
    /// The data length
    pub dlc: u8,
    /// The frame identifier
    pub id: CanId,
}

impl Default for CanMessage {
    fn default() -> Self {
        Self {
            data: [0; MAX_DATA_LENGTH],
            dlc: 0,
            id: CanId::Std(0),
        }
    }
}

impl CanMessage {
    /// Create a new message
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than 8 bytes
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let dlc = data.len();
        if dlc > MAX_DATA_LENGTH {
            panic!("Data length exceeds maximum size of {} bytes", MAX_DATA_LENGTH);
        }
        let mut buf = [0u8; MAX_DATA_LENGTH];
        buf[0..dlc].copy_from_slice(data);

        Self {
            id,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Get the identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// Get the valid payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[0..(self.dlc as usize).min(MAX_DATA_LENGTH)]
    }
}

/// Error returned when decoding a message fails
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum MessageError {
    /// The message has an unexpected identifier
    #[snafu(display("Unexpected message ID {cob_id:?}, expected {expected:?}"))]
    UnexpectedId {
        /// The received identifier
        cob_id: CanId,
        /// The expected identifier
        expected: CanId,
    },
    /// The message payload has an unexpected length
    #[snafu(display("Unexpected message length {dlc}"))]
    UnexpectedLength {
        /// The received length
        dlc: u8,
    },
}

/// The default SYNC identifier
pub const SYNC_ID: CanId = CanId::Std(crate::constants::values::DEFAULT_SYNC_ID);

/// The NMT operating state of a node
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NmtState {
    /// Initializing after power-on or reset
    #[default]
    Bootup = 0,
    /// Stopped; no PDO or SYNC communication
    Stopped = 4,
    /// Operational; PDOs are exchanged
    Operational = 5,
    /// Pre-operational; SYNC is processed, PDOs are not
    PreOperational = 127,
}

impl NmtState {
    /// Returns true if SYNC objects are processed in this state
    pub fn sync_active(&self) -> bool {
        matches!(self, NmtState::Operational | NmtState::PreOperational)
    }
}

/// Error returned when converting an invalid byte into an [`NmtState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
#[snafu(display("Invalid NMT state {value}"))]
pub struct InvalidNmtStateError {
    value: u8,
}

impl TryFrom<u8> for NmtState {
    type Error = InvalidNmtStateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use NmtState::*;
        match value {
            x if x == Bootup as u8 => Ok(Bootup),
            x if x == Stopped as u8 => Ok(Stopped),
            x if x == Operational as u8 => Ok(Operational),
            x if x == PreOperational as u8 => Ok(PreOperational),
            _ => Err(InvalidNmtStateError { value }),
        }
    }
}

/// Represents a SYNC object/message
///
/// The SYNC producer sends a periodic frame to all nodes. When a counter overflow value is
/// configured, the frame carries a one byte counter which starts at 1 and wraps back to 1 after
/// reaching the overflow value. Otherwise the frame is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncObject {
    /// The counter value, if the frame carries one
    pub counter: Option<u8>,
}

impl SyncObject {
    /// Create a new SYNC object
    pub fn new(counter: Option<u8>) -> Self {
        Self { counter }
    }

    /// Encode the SYNC frame with the given identifier
    pub fn to_can_message(self, id: CanId) -> CanMessage {
        match self.counter {
            Some(counter) => CanMessage::new(id, &[counter]),
            None => CanMessage::new(id, &[]),
        }
    }

    /// Decode a SYNC frame
    ///
    /// `counter_overflow` is the configured overflow value, which determines whether a counter
    /// byte is expected. The length check follows the object 0x1019 rules: with no counter
    /// the frame must be empty, otherwise it must contain exactly one byte.
    pub fn from_can_message(msg: &CanMessage, counter_overflow: u8) -> Result<Self, MessageError> {
        match (counter_overflow, msg.dlc) {
            (0, 0) => Ok(Self { counter: None }),
            (0, dlc) => UnexpectedLengthSnafu { dlc }.fail(),
            (_, 1) => Ok(Self {
                counter: Some(msg.data[0]),
            }),
            (_, dlc) => UnexpectedLengthSnafu { dlc }.fail(),
        }
    }
}
