//! Reporting of communication errors
//!
//! The PDO and SYNC processing report problems through the [`ErrorSink`] trait. A node is created
//! with a reference to a sink, so the application decides how errors are handled. [`ErrorStatus`]
//! is a ready made sink which keeps track of the active errors and can forward new reports to an
//! application callback, e.g. for emitting EMCY messages.

use defmt_or_log::{info, warn};
use pdosync_common::AtomicCell;

/// Emergency error codes used by the PDO and SYNC processing
pub mod emergency_codes {
    /// Generic communication error
    pub const COMMUNICATION: u16 = 0x8100;
    /// CAN overrun (objects lost)
    pub const CAN_OVERRUN: u16 = 0x8110;
    /// Protocol error
    pub const PROTOCOL_ERROR: u16 = 0x8200;
    /// Unexpected SYNC data length
    pub const SYNC_DATA_LENGTH: u16 = 0x8240;
}

/// The kinds of error reported by this crate
///
/// The discriminant is the bit number of the error in the CANopen error status bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorKind {
    /// A frame could not be queued for transmission
    CanTxOverflow = 0x14,
    /// No SYNC was received within 1.5 communication cycle periods
    SyncTimeout = 0x18,
    /// A SYNC frame with the wrong length was received
    SyncLength = 0x19,
    /// A PDO mapping could not be resolved
    PdoWrongMapping = 0x1A,
}

impl ErrorKind {
    /// The bit number in the error status bits
    pub const fn status_bit(&self) -> u8 {
        *self as u8
    }

    /// The emergency error code normally reported with this error
    pub const fn emergency_code(&self) -> u16 {
        match self {
            ErrorKind::CanTxOverflow => emergency_codes::CAN_OVERRUN,
            ErrorKind::SyncTimeout => emergency_codes::COMMUNICATION,
            ErrorKind::SyncLength => emergency_codes::SYNC_DATA_LENGTH,
            ErrorKind::PdoWrongMapping => emergency_codes::PROTOCOL_ERROR,
        }
    }

    const fn mask(&self) -> u32 {
        1 << (self.status_bit() - ErrorKind::CanTxOverflow.status_bit())
    }
}

/// A single error report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorReport {
    /// What went wrong
    pub kind: ErrorKind,
    /// The emergency error code
    pub code: u16,
    /// Additional information, e.g. the offending mapping parameter or timer value
    pub info: u32,
}

/// Receives error reports from the PDO and SYNC processing
pub trait ErrorSink: Sync + Send {
    /// Report that an error condition is present
    fn report(&self, kind: ErrorKind, code: u16, info: u32);

    /// Report that an error condition has cleared
    fn reset(&self, kind: ErrorKind, info: u32);
}

/// Callback type for [`ErrorStatus::register_callback`]
pub type ErrorCallback = dyn Fn(ErrorReport) + Sync;

/// An [`ErrorSink`] which tracks the set of active errors
///
/// An error which is already active is not reported again until it has been reset.
#[allow(missing_debug_implementations)]
pub struct ErrorStatus {
    active: AtomicCell<u32>,
    last_report: AtomicCell<Option<ErrorReport>>,
    callback: AtomicCell<Option<&'static ErrorCallback>>,
}

impl ErrorStatus {
    /// Create a new status with no active errors
    pub const fn new() -> Self {
        Self {
            active: AtomicCell::new(0),
            last_report: AtomicCell::new(None),
            callback: AtomicCell::new(None),
        }
    }

    /// Register a callback to be called for each new error report
    pub fn register_callback(&self, callback: &'static ErrorCallback) {
        self.callback.store(Some(callback));
    }

    /// Returns true if the error is currently active
    pub fn is_active(&self, kind: ErrorKind) -> bool {
        self.active.load() & kind.mask() != 0
    }

    /// Returns true if any error is active
    pub fn any_active(&self) -> bool {
        self.active.load() != 0
    }

    /// Get the most recent report
    pub fn last_report(&self) -> Option<ErrorReport> {
        self.last_report.load()
    }

    /// Clear all errors
    pub fn clear(&self) {
        self.active.store(0);
        self.last_report.store(None);
    }
}

impl Default for ErrorStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for ErrorStatus {
    fn report(&self, kind: ErrorKind, code: u16, info: u32) {
        let mask = kind.mask();
        if self.active.fetch_update(|bits| (bits & mask == 0).then_some(bits | mask)).is_err() {
            return;
        }
        warn!(
            "Error bit 0x{:x} set, code 0x{:x}, info 0x{:x}",
            kind.status_bit(),
            code,
            info
        );
        let report = ErrorReport { kind, code, info };
        self.last_report.store(Some(report));
        if let Some(cb) = self.callback.load() {
            cb(report);
        }
    }

    fn reset(&self, kind: ErrorKind, info: u32) {
        let mask = kind.mask();
        if self.active.fetch_update(|bits| (bits & mask != 0).then_some(bits & !mask)).is_ok() {
            info!("Error bit 0x{:x} cleared, info 0x{:x}", kind.status_bit(), info);
        }
    }
}
