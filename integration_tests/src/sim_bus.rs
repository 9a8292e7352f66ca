//! A simulated CAN bus for observing the frames sent by a node
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use pdosync_common::{
    traits::{CanSendError, CanSender},
    CanMessage,
};

/// A bus with a bounded transmit queue
///
/// Frames sent through a [`SimBusSender`] are queued until they are taken from a
/// [`SimBusReceiver`]. When the queue is full, sends fail the same way a hardware transmit queue
/// would.
pub struct SimBus {
    tx: Sender<CanMessage>,
    rx: Receiver<CanMessage>,
}

impl SimBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub fn new_sender(&self) -> SimBusSender {
        SimBusSender {
            tx: self.tx.clone(),
            sync_pdos_sent: 0,
            sync_clears: 0,
        }
    }

    pub fn new_receiver(&self) -> SimBusReceiver {
        SimBusReceiver {
            rx: self.rx.clone(),
        }
    }
}

pub struct SimBusSender {
    tx: Sender<CanMessage>,
    /// The number of synchronous PDOs which have been sent
    pub sync_pdos_sent: usize,
    /// The number of times the node asked to drop pending synchronous PDOs
    pub sync_clears: usize,
}

impl CanSender for SimBusSender {
    fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(msg) | TrySendError::Disconnected(msg) => CanSendError(msg),
        })
    }

    fn send_sync_pdo(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        self.send(msg)?;
        self.sync_pdos_sent += 1;
        Ok(())
    }

    fn clear_pending_sync(&mut self) {
        self.sync_clears += 1;
    }
}

pub struct SimBusReceiver {
    rx: Receiver<CanMessage>,
}

impl SimBusReceiver {
    pub fn try_recv(&mut self) -> Option<CanMessage> {
        self.rx.try_recv().ok()
    }

    /// Take all queued frames
    pub fn drain(&mut self) -> Vec<CanMessage> {
        self.rx.try_iter().collect()
    }

    /// Discard all queued frames
    pub fn flush(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
