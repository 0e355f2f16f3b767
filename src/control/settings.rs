//! Controller-owned breath parameters.
//!
//! These are the values the control loop actually runs on.  Each has a
//! fixed admissible range; a proposed value outside it is refused and the
//! previous value stays in force.  Settings are independent of each other:
//! any in-range value is adopted as proposed.

use crate::config::VentConfig;
use crate::error::{Error, Result};
use crate::message::{ControlSetting, Timestamp, ValueName};

/// Names accepted by `set_control` / `get_control`.
pub const RECOGNIZED: [ValueName; 5] = [
    ValueName::Pip,
    ValueName::PipTime,
    ValueName::Peep,
    ValueName::BreathsPerMinute,
    ValueName::InspirationTimeSec,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

impl Param {
    fn with_value(self, value: f32) -> Self {
        Self {
            value: value.clamp(self.min, self.max),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathParameters {
    /// Target peak inspiratory pressure (cmH2O).
    pub pip: Param,
    /// Time allotted to reach PIP (s).
    pub pip_time: Param,
    /// Target end-expiratory pressure (cmH2O).
    pub peep: Param,
    pub breaths_per_minute: Param,
    /// Ramp + hold duration (s).
    pub inspiration_time_sec: Param,
}

impl Default for BreathParameters {
    fn default() -> Self {
        Self::from_config(&VentConfig::default())
    }
}

impl BreathParameters {
    /// Controller range `(min, max)` of a recognised setting.
    pub const fn range(name: ValueName) -> Option<(f32, f32)> {
        match name {
            ValueName::Pip => Some((0.0, 70.0)),
            ValueName::PipTime => Some((0.1, 5.0)),
            ValueName::Peep => Some((0.0, 20.0)),
            ValueName::BreathsPerMinute => Some((4.0, 40.0)),
            ValueName::InspirationTimeSec => Some((0.2, 5.0)),
            _ => None,
        }
    }

    pub fn from_config(config: &VentConfig) -> Self {
        let bounded = |name: ValueName, value: f32| {
            let (min, max) = Self::range(name).unwrap_or((value, value));
            Param { value: min, min, max }.with_value(value)
        };
        Self {
            pip: bounded(ValueName::Pip, config.pip),
            pip_time: bounded(ValueName::PipTime, config.pip_time),
            peep: bounded(ValueName::Peep, config.peep),
            breaths_per_minute: bounded(ValueName::BreathsPerMinute, config.breaths_per_minute),
            inspiration_time_sec: bounded(ValueName::InspirationTimeSec, config.inspiration_time_sec),
        }
    }

    fn param(&self, name: ValueName) -> Option<&Param> {
        match name {
            ValueName::Pip => Some(&self.pip),
            ValueName::PipTime => Some(&self.pip_time),
            ValueName::Peep => Some(&self.peep),
            ValueName::BreathsPerMinute => Some(&self.breaths_per_minute),
            ValueName::InspirationTimeSec => Some(&self.inspiration_time_sec),
            _ => None,
        }
    }

    fn param_mut(&mut self, name: ValueName) -> Option<&mut Param> {
        match name {
            ValueName::Pip => Some(&mut self.pip),
            ValueName::PipTime => Some(&mut self.pip_time),
            ValueName::Peep => Some(&mut self.peep),
            ValueName::BreathsPerMinute => Some(&mut self.breaths_per_minute),
            ValueName::InspirationTimeSec => Some(&mut self.inspiration_time_sec),
            _ => None,
        }
    }

    /// Current value of `name` as a setting stamped `timestamp`.
    pub fn get(&self, name: ValueName, timestamp: Timestamp) -> Option<ControlSetting> {
        self.param(name).map(|p| ControlSetting {
            name,
            value: p.value,
            min_value: p.min,
            max_value: p.max,
            timestamp,
        })
    }

    pub fn breath_period_sec(&self) -> f32 {
        60.0 / self.breaths_per_minute.value
    }

    /// Adopt `setting.value` if it lies in the controller's range.  On
    /// error nothing changes.
    pub fn apply(&mut self, setting: &ControlSetting) -> Result<()> {
        let name = setting.name;
        let param = self.param_mut(name).ok_or(Error::NotFound(name))?;
        let value = setting.value;
        if !(param.min <= value && value <= param.max) {
            return Err(Error::range(name.to_string(), value, param.min, param.max));
        }
        param.value = value;
        Ok(())
    }
}
