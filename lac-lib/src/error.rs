use crate::constants::MAX_VALUE;
use crate::packet::Direction;
use num_enum::TryFromPrimitiveError;
use thiserror::Error;

use crate::command::Command;

/// The primary error type for the `lac-lib` library.
#[derive(Error, Debug)]
pub enum LacError {
    #[error("No LAC board found (VID {vendor_id:#06x}, PID {product_id:#06x}). Is it connected and powered?")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Invalid command opcode {0:#04x}")]
    InvalidCommand(u8),

    #[error("Unknown command name '{0}'")]
    UnknownCommand(String),

    #[error("Value {0} is out of range, must be within [0, {max}]", max = MAX_VALUE)]
    ValueOutOfRange(i64),

    #[error("Timeout during USB transfer ({direction})")]
    Timeout { direction: Direction },

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Exchange worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Device lock poisoned by a panicked exchange")]
    LockPoisoned,

    #[error("Echo mismatch: sent ({sent_mode:#04x}, {sent_value}), got ({mode:#04x}, {payload})")]
    EchoMismatch {
        sent_mode: u8,
        sent_value: u16,
        mode: u8,
        payload: u16,
    },

    #[error("Actuator did not reach position {target} in time (last reading: {last:?})")]
    PositionTimeout { target: u16, last: Option<u16> },
}

impl LacError {
    /// True for failures of the underlying write/read, as opposed to input
    /// validation. After one of these the device state is unknown.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            LacError::Timeout { .. }
                | LacError::ShortRead { .. }
                | LacError::ShortWrite { .. }
                | LacError::Usb(_)
                | LacError::Transfer(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, LacError::Timeout { .. })
    }
}

impl From<TryFromPrimitiveError<Command>> for LacError {
    fn from(err: TryFromPrimitiveError<Command>) -> Self {
        LacError::InvalidCommand(err.number)
    }
}
