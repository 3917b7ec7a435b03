//! The LAC command catalog.
//!
//! Every request starts with one of these opcodes. The set is closed: the
//! board ignores or misbehaves on anything else, so raw opcodes are checked
//! with `Command::try_from(u8)` before a frame is built.
//!
//! Argument semantics come from the vendor's configuration datasheet. Several
//! of them (stall time units, the PWM threshold formula, what `SetSpeed`
//! mirrors) were never confirmed on hardware and are documented as such.

use crate::error::LacError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::str::FromStr;
use strum_macros::Display;
use zerocopy::{Immutable, IntoBytes, KnownLayout, Unaligned};

/// One-byte protocol opcode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    IntoPrimitive,
    TryFromPrimitive,
    IntoBytes,
    KnownLayout,
    Immutable,
    Unaligned,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Command {
    /// Tolerance around the target that counts as "arrived", raw units.
    SetAccuracy = 0x01,
    /// Minimum extension. 0 hits the mechanical stop.
    SetRetractLimit = 0x02,
    /// Maximum extension. 1023 hits the mechanical stop.
    SetExtendLimit = 0x03,
    /// Speed below which the actuator is considered stalled.
    SetMovementThreshold = 0x04,
    /// Time before the motor is stopped after a stall (ms per datasheet, unverified).
    SetStallTime = 0x05,
    /// Distance around the set point where the PD controller is active.
    SetPwmThreshold = 0x06,
    /// Speed threshold for increasing PWM to escape a stall.
    SetDerivativeThreshold = 0x07,
    /// Upper bound on the derivative term.
    SetMaxDerivative = 0x08,
    /// Lower bound on the derivative term.
    SetMinDerivative = 0x09,
    /// Drive speed outside the PWM threshold. 1023 is top speed.
    SetMaxPwmValue = 0x0A,
    /// Minimum PWM applied by the PD controller.
    SetMinPwmValue = 0x0B,
    /// Kp.
    SetProportionalGain = 0x0C,
    /// Kd. Incremented while stalling rather than a true derivative.
    SetDerivativeGain = 0x0D,
    /// RC input filter length in samples (20 ms each).
    SetAverageRc = 0x0E,
    /// Feedback and analog input filter length in samples (20 ms each).
    SetAverageAdc = 0x0F,
    /// Read the current position straight from the ADC.
    GetFeedback = 0x10,
    /// Move to a position. Disables RC, I and V inputs until reboot.
    SetPosition = 0x20,
    /// Undocumented. Probably mirrors the speed potentiometer.
    SetSpeed = 0x21,
    /// Save the configuration to EEPROM and disable the potentiometers.
    DisableManual = 0x30,
    /// Re-enable the potentiometers and restore the factory configuration.
    Reset = 0xFF,
}

/// What the payload of a response to a given command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// The value that was just sent.
    Echo,
    /// The actuator's current position, read from the ADC.
    Position,
}

impl Command {
    /// The full catalog in opcode order.
    pub const ALL: [Command; 20] = [
        Command::SetAccuracy,
        Command::SetRetractLimit,
        Command::SetExtendLimit,
        Command::SetMovementThreshold,
        Command::SetStallTime,
        Command::SetPwmThreshold,
        Command::SetDerivativeThreshold,
        Command::SetMaxDerivative,
        Command::SetMinDerivative,
        Command::SetMaxPwmValue,
        Command::SetMinPwmValue,
        Command::SetProportionalGain,
        Command::SetDerivativeGain,
        Command::SetAverageRc,
        Command::SetAverageAdc,
        Command::GetFeedback,
        Command::SetPosition,
        Command::SetSpeed,
        Command::DisableManual,
        Command::Reset,
    ];

    pub fn opcode(self) -> u8 {
        self.into()
    }

    pub fn response_kind(self) -> ResponseKind {
        match self {
            Command::GetFeedback | Command::SetPosition => ResponseKind::Position,
            _ => ResponseKind::Echo,
        }
    }

    /// False for commands that are always sent with a value of 0.
    pub fn takes_argument(self) -> bool {
        !matches!(self, Command::GetFeedback | Command::DisableManual | Command::Reset)
    }

    /// One-line summary for help output.
    pub fn summary(self) -> &'static str {
        match self {
            Command::SetAccuracy => "target tolerance, raw units",
            Command::SetRetractLimit => "minimum extension, raw units",
            Command::SetExtendLimit => "maximum extension, raw units",
            Command::SetMovementThreshold => "stall speed threshold",
            Command::SetStallTime => "stall timeout (ms, unverified)",
            Command::SetPwmThreshold => "distance where PD control is active",
            Command::SetDerivativeThreshold => "derivative term activation threshold",
            Command::SetMaxDerivative => "upper bound on D term",
            Command::SetMinDerivative => "lower bound on D term",
            Command::SetMaxPwmValue => "maximum drive speed",
            Command::SetMinPwmValue => "minimum drive speed",
            Command::SetProportionalGain => "P gain",
            Command::SetDerivativeGain => "D gain",
            Command::SetAverageRc => "RC input filter samples",
            Command::SetAverageAdc => "feedback filter samples",
            Command::GetFeedback => "read current position",
            Command::SetPosition => "move to position, raw units",
            Command::SetSpeed => "speed (undocumented)",
            Command::DisableManual => "save config, disable potentiometers",
            Command::Reset => "factory reset, enable potentiometers",
        }
    }
}

impl FromStr for Command {
    type Err = LacError;

    /// Parses catalog names case-insensitively, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Command::ALL
            .into_iter()
            .find(|c| c.to_string() == normalized)
            .ok_or_else(|| LacError::UnknownCommand(s.to_string()))
    }
}
