//! RPC schema shared by client and server.
//!
//! Every frame carries one [`Envelope`]:
//!
//! ```text
//!   Envelope { version: u16, seq: u32, body: Request | Response }
//! ```
//!
//! `version` comes first on the wire so a peer built against another
//! schema is detected before the body is decoded.  `seq` is chosen by the
//! client and echoed by the server.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, TransportError};
use crate::message::{Alarm, ControlSetting, SensorValues, ValueName};

pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    GetSensors,
    GetActiveAlarms,
    GetLoggedAlarms,
    ClearLoggedAlarms,
    SetControl(ControlSetting),
    GetControl(ValueName),
    Start,
    Stop,
    IsRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Sensors(SensorValues),
    ActiveAlarms(BTreeMap<String, Alarm>),
    LoggedAlarms(Vec<Alarm>),
    Control(ControlSetting),
    Running(bool),
    Ok,
    Error(Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u16,
    pub seq: u32,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u32, body: T) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            seq,
            body,
        }
    }
}

pub fn encode<T: Serialize>(envelope: &Envelope<T>) -> Result<Vec<u8>, TransportError> {
    postcard::to_allocvec(envelope).map_err(|_| TransportError::Encode)
}

/// Read just `(version, seq)` from the front of a payload.
pub fn peek_header(bytes: &[u8]) -> Result<(u16, u32), TransportError> {
    postcard::take_from_bytes::<(u16, u32)>(bytes)
        .map(|(header, _)| header)
        .map_err(|_| TransportError::Decode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<T>, TransportError> {
    let (version, _) = peek_header(bytes)?;
    if version != PROTOCOL_VERSION {
        return Err(TransportError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }
    postcard::from_bytes(bytes).map_err(|_| TransportError::Decode)
}
