//! Value model shared by every component.
//!
//! Plain records: sensor readings, control settings, alarms and error
//! reports, keyed by the closed [`ValueName`] enumeration.  Nothing here has
//! behaviour beyond construction, comparison and simple lookups.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ---------------------------------------------------------------------------
// ValueName
// ---------------------------------------------------------------------------

/// Recognised physiological / control quantities.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueName {
    Pressure,
    Peep,
    Pip,
    PipTime,
    Fio2,
    Temp,
    Humidity,
    Vte,
    BreathsPerMinute,
    InspirationTimeSec,
    Flow,
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Microseconds since the UNIX epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Wall-clock now.  Falls back to zero if the clock is before 1970.
    pub fn now() -> Self {
        let us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_micros() as u64);
        Self(us)
    }

    /// Microseconds elapsed from `earlier` to `self` (zero if reversed).
    pub fn micros_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// ---------------------------------------------------------------------------
// Sensor values
// ---------------------------------------------------------------------------

/// One named reading taken during one loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub name: ValueName,
    pub value: f32,
    pub timestamp: Timestamp,
    pub loop_counter: u64,
}

/// Complete snapshot of every measured quantity from a single tick.
///
/// `loop_counter` strictly increases and `timestamp` never decreases across
/// snapshots produced by one control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorValues {
    pub pip: f32,
    pub peep: f32,
    pub fio2: f32,
    pub temp: f32,
    pub humidity: f32,
    pub pressure: f32,
    pub vte: f32,
    pub breaths_per_minute: f32,
    pub inspiration_time_sec: f32,
    pub flow: f32,
    pub timestamp: Timestamp,
    pub loop_counter: u64,
}

impl SensorValues {
    /// Reading for `name`, or `None` for quantities that are settings only.
    pub fn get(&self, name: ValueName) -> Option<f32> {
        match name {
            ValueName::Pressure => Some(self.pressure),
            ValueName::Peep => Some(self.peep),
            ValueName::Pip => Some(self.pip),
            ValueName::Fio2 => Some(self.fio2),
            ValueName::Temp => Some(self.temp),
            ValueName::Humidity => Some(self.humidity),
            ValueName::Vte => Some(self.vte),
            ValueName::BreathsPerMinute => Some(self.breaths_per_minute),
            ValueName::InspirationTimeSec => Some(self.inspiration_time_sec),
            ValueName::Flow => Some(self.flow),
            ValueName::PipTime => None,
        }
    }

    /// `name`'s reading stamped with this snapshot's time and tick.
    pub fn reading(&self, name: ValueName) -> Option<SensorValue> {
        self.get(name).map(|value| SensorValue {
            name,
            value,
            timestamp: self.timestamp,
            loop_counter: self.loop_counter,
        })
    }
}

// ---------------------------------------------------------------------------
// Control settings
// ---------------------------------------------------------------------------

/// A named target value with its admissible range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSetting {
    pub name: ValueName,
    pub value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub timestamp: Timestamp,
}

impl ControlSetting {
    pub fn new(name: ValueName, value: f32, min_value: f32, max_value: f32) -> Self {
        Self {
            name,
            value,
            min_value,
            max_value,
            timestamp: Timestamp::now(),
        }
    }

    /// `min_value <= value <= max_value` (false for NaN).
    pub fn is_admissible(&self) -> bool {
        self.min_value <= self.value && self.value <= self.max_value
    }

    /// Value comparison used when promoting a tentative setting: the change
    /// time alone never counts as a difference.
    pub fn differs_from(&self, other: &Self) -> bool {
        self.name != other.name
            || self.value != other.value
            || self.min_value != other.min_value
            || self.max_value != other.max_value
    }
}

// ---------------------------------------------------------------------------
// Alarms
// ---------------------------------------------------------------------------

/// Alarm priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlarmSeverity {
    Red,
    Orange,
    Yellow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub alarm_name: String,
    pub is_active: bool,
    pub severity: AlarmSeverity,
    pub alarm_start_time: Timestamp,
    pub alarm_end_time: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Error reports
// ---------------------------------------------------------------------------

/// A hardware or control-loop fault surfaced without stopping the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub errnum: u32,
    pub err_str: String,
    pub timestamp: Timestamp,
}

impl ErrorRecord {
    pub fn from_error(error: &crate::error::Error, timestamp: Timestamp) -> Self {
        Self {
            errnum: error.code(),
            err_str: error.to_string(),
            timestamp,
        }
    }
}
