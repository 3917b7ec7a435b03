//! Request and response frames.
//!
//! Both directions use the same 3-byte layout: one mode/opcode byte followed
//! by a 16-bit little-endian value. The low byte goes first on the wire.

use crate::command::{Command, ResponseKind};
use crate::constants::{FRAME_SIZE, MAX_VALUE};
use crate::error::LacError;
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Represents the direction of a USB transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Direction {
    HostToDevice,
    DeviceToHost,
}

/// `[opcode, value_low, value_high]`
///
/// Only constructible through validation, so every instance holds a catalog
/// opcode and a value in `[0, 1023]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RequestFrame {
    command: Command,
    value: U16,
}

impl RequestFrame {
    pub fn new(command: Command, value: u16) -> Result<Self, LacError> {
        if value > MAX_VALUE {
            return Err(LacError::ValueOutOfRange(value.into()));
        }
        Ok(Self {
            command,
            value: U16::new(value),
        })
    }

    /// Validates an untyped opcode/value pair, e.g. from user input.
    pub fn from_raw(opcode: u8, value: i64) -> Result<Self, LacError> {
        let command = Command::try_from(opcode)?;
        let value = u16::try_from(value).map_err(|_| LacError::ValueOutOfRange(value))?;
        Self::new(command, value)
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn value(&self) -> u16 {
        self.value.get()
    }

    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

/// `[mode, payload_low, payload_high]` as returned by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ResponseFrame {
    mode: u8,
    payload: U16,
}

impl ResponseFrame {
    pub fn new(mode: u8, payload: u16) -> Self {
        Self {
            mode,
            payload: U16::new(payload),
        }
    }

    /// Decodes the first three bytes of `bytes`. Fewer than three is a short read.
    pub fn decode(bytes: &[u8]) -> Result<Self, LacError> {
        let short = || LacError::ShortRead {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        };
        let head = bytes.get(..FRAME_SIZE).ok_or_else(short)?;
        Self::read_from_bytes(head).map_err(|_| short())
    }

    /// The board's current control mode; usually the opcode just sent.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn payload(&self) -> u16 {
        self.payload.get()
    }

    /// The mode byte interpreted as a catalog opcode, if it is one.
    pub fn echoed_command(&self) -> Option<Command> {
        Command::try_from(self.mode).ok()
    }

    /// Checks that the board echoed `request` back.
    ///
    /// Position-reporting commands never echo, so they always pass.
    pub fn verify_echo(&self, request: &RequestFrame) -> Result<(), LacError> {
        if request.command.response_kind() == ResponseKind::Position {
            return Ok(());
        }
        if self.mode == request.command.opcode() && self.payload() == request.value() {
            Ok(())
        } else {
            Err(LacError::EchoMismatch {
                sent_mode: request.command.opcode(),
                sent_value: request.value(),
                mode: self.mode,
                payload: self.payload(),
            })
        }
    }
}
