//! Unified error types for the ventilator control core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! coordinator's and the RPC layer's error handling uniform.  The enum is
//! serde-serialisable so a remote coordinator can hand the exact failure
//! back to its caller.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::message::ValueName;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control core funnels into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Invalid valve form, empty/malformed calibration table, bad config.
    /// Fatal at construction, never retried.
    Configuration(String),
    /// A setpoint or control value was outside its admissible range.
    /// The rejected write had no effect.
    Range {
        what: String,
        value: f32,
        min: f32,
        max: f32,
    },
    /// A control setting was queried before any value was established,
    /// or the name is not a recognised control setting.
    NotFound(ValueName),
    /// A sensor produced no valid reading for too many consecutive ticks.
    SensorFault(ValueName),
    /// An actuator read/write failed.
    Actuator(ActuatorError),
    /// The RPC link to a remote coordinator failed.
    Transport(TransportError),
}

impl Error {
    /// Build a [`Error::Range`] for `what`.
    pub fn range(what: impl Into<String>, value: f32, min: f32, max: f32) -> Self {
        Self::Range {
            what: what.into(),
            value,
            min,
            max,
        }
    }

    /// Build a [`Error::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Stable numeric code used when the error is recorded as an
    /// [`ErrorRecord`](crate::message::ErrorRecord).
    pub const fn code(&self) -> u32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Range { .. } => 2,
            Self::NotFound(_) => 3,
            Self::SensorFault(_) => 4,
            Self::Actuator(_) => 5,
            Self::Transport(_) => 6,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration: {msg}"),
            Self::Range {
                what,
                value,
                min,
                max,
            } => write!(f, "range: {what}={value} outside [{min}, {max}]"),
            Self::NotFound(name) => write!(f, "not found: {name}"),
            Self::SensorFault(name) => write!(f, "sensor fault: {name}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Raw read failures reported by a [`SensorPort`](crate::app::ports::SensorPort).
///
/// These never reach a caller directly: the sensor hub absorbs them and only
/// escalates to [`Error::SensorFault`] once the failure persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorError {
    /// The device did not answer or the bus transaction failed.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// No device is installed for this quantity.
    NotInstalled,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotInstalled => write!(f, "sensor not installed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorError {
    /// Level or duty-cycle write failed.
    WriteFailed,
    /// Level or duty-cycle read-back failed.
    ReadFailed,
    /// The drive cannot run at the requested PWM frequency.
    FrequencyRejected(u32),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::FrequencyRejected(hz) => write!(f, "frequency {hz} Hz rejected"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures of the cross-process RPC link.  Always surfaced to the caller
/// of a remote coordinator, never swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// The peer closed the connection.
    Disconnected,
    /// Underlying I/O failed.
    Io,
    /// A frame header announced a payload larger than the limit.
    FrameTooLarge(u32),
    /// Payload could not be serialised.
    Encode,
    /// Payload could not be deserialised.
    Decode,
    /// The peer speaks a different protocol version.
    VersionMismatch { expected: u16, actual: u16 },
    /// The response does not answer the request that was sent.
    SequenceMismatch { expected: u32, actual: u32 },
    /// The response variant does not fit the request.
    UnexpectedResponse,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "peer disconnected"),
            Self::Io => write!(f, "I/O error"),
            Self::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds limit"),
            Self::Encode => write!(f, "encode failed"),
            Self::Decode => write!(f, "decode failed"),
            Self::VersionMismatch { expected, actual } => {
                write!(f, "protocol version mismatch (expected {expected}, got {actual})")
            }
            Self::SequenceMismatch { expected, actual } => {
                write!(f, "sequence mismatch (expected {expected}, got {actual})")
            }
            Self::UnexpectedResponse => write!(f, "unexpected response"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => Self::Disconnected,
            _ => Self::Io,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
