//! Common traits

use crate::messages::CanMessage;

/// Error type for CAN send operations containing the failed message
///
/// This is returned when the transmit queue is full. The frame is handed back so the caller can
/// decide whether to try again.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct CanSendError(pub CanMessage);

impl core::fmt::Display for CanSendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to send CAN message: {:?}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CanSendError {}

/// A synchronous CAN sender
pub trait CanSender {
    /// Send a message to the bus
    fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError>;

    /// Send a synchronous TPDO
    ///
    /// Transports which queue frames can keep track of these so that they can be dropped by
    /// [`CanSender::clear_pending_sync`]. The default implementation is a plain send.
    fn send_sync_pdo(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        self.send(msg)
    }

    /// Drop any synchronous TPDOs which are still waiting in the transmit queue
    ///
    /// Called when the synchronous window expires.
    fn clear_pending_sync(&mut self) {}
}

impl<F: FnMut(CanMessage) -> Result<(), CanSendError>> CanSender for F {
    fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        self(msg)
    }
}
