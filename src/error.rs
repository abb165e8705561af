//! Error types. All of them are recovered where they occur; none aborts a
//! control tick.

use thiserror::Error;

/// Rejected 7-byte frame on the cyclic sensor link.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("end marker missing at offset 6")]
    BadEndMarker,

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Dropped line on the simulator telemetry link.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    #[error("line is not a telemetry object")]
    Malformed,

    #[error("line exceeds buffer capacity")]
    LineTooLong,
}

/// Why an enable request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngageError {
    #[error("no simulator telemetry in the validity window")]
    NoTelemetry,

    #[error("airspeed {speed} below engage minimum")]
    TooSlow { speed: f32 },
}

/// Why an engaged autopilot was forced off.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisengageReason {
    #[error("simulator telemetry lost")]
    TelemetryLost,

    #[error("airspeed {speed} below minimum")]
    TooSlow { speed: f32 },
}

impl From<EngageError> for DisengageReason {
    fn from(err: EngageError) -> Self {
        match err {
            EngageError::NoTelemetry => DisengageReason::TelemetryLost,
            EngageError::TooSlow { speed } => DisengageReason::TooSlow { speed },
        }
    }
}

/// Text command that could not be turned into a [`Command`](crate::control::commands::Command).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command")]
    UnknownCommand,

    #[error("missing argument")]
    MissingArgument,

    #[error("invalid argument value")]
    InvalidValue,
}
