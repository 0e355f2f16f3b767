//! System configuration parameters
//!
//! All tunable parameters for the ventilator control core.
//! Values are compiled-in defaults, optionally overridden by a JSON file
//! handed to the `ventd` binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::drivers::valve::ValveForm;
use crate::error::{Error, Result};

/// Plausible span for one sensor channel.  Readings outside it are treated
/// as invalid and replaced by the last good value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorRange {
    pub min: f32,
    pub max: f32,
}

impl SensorRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && self.min <= value && value <= self.max
    }
}

/// Core control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VentConfig {
    // --- PID ---
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,

    // --- Ramp ---
    /// Number of pressure increments between zero and PIP.
    pub n_ramp_steps: u32,
    /// Duty seed at step 0.
    pub ramp_seed_base: f32,
    /// Duty seed added across the full ramp (seed = base + span·i/n).
    pub ramp_seed_span: f32,
    /// Upper bound on the wall-clock time spent on one ramp step.
    pub max_step_budget_ms: u64,
    /// |error| under which a ramp step counts as converged.
    pub ramp_tolerance: f32,
    /// Consecutive converged ticks before a ramp step ends early.
    pub ramp_converge_ticks: u32,

    // --- Timing ---
    /// Inner correction loop sleep between sensor reads.
    pub tick_interval_ms: u64,
    /// Minimum time the release phase holds the valve shut.
    pub release_settle_ms: u64,

    // --- Breath defaults ---
    pub pip: f32,
    pub pip_time: f32,
    pub peep: f32,
    pub breaths_per_minute: f32,
    pub inspiration_time_sec: f32,

    // --- Sensors ---
    /// Consecutive invalid readings before a channel is declared faulted.
    pub sensor_fault_threshold: u32,
    pub pressure_range: SensorRange,
    pub flow_range: SensorRange,
    pub fio2_range: SensorRange,
    pub temp_range: SensorRange,
    pub humidity_range: SensorRange,

    // --- Alarms ---
    pub pressure_alarm_margin: f32,
    pub alarm_log_capacity: usize,

    // --- Valves ---
    pub valve_frequency_hz: u32,
    pub inlet_valve_form: ValveForm,
    pub control_valve_form: ValveForm,
}

impl Default for VentConfig {
    fn default() -> Self {
        Self {
            // PID
            kp: 0.0001,
            ki: 0.0,
            kd: 0.0,

            // Ramp
            n_ramp_steps: 5,
            ramp_seed_base: 0.6,
            ramp_seed_span: 0.4,
            max_step_budget_ms: 10_000,
            ramp_tolerance: 0.5,
            ramp_converge_ticks: 10,

            // Timing
            tick_interval_ms: 5,
            release_settle_ms: 3_000,

            // Breath
            pip: 25.0,
            pip_time: 0.9,
            peep: 5.0,
            breaths_per_minute: 12.0,
            inspiration_time_sec: 1.5,

            // Sensors
            sensor_fault_threshold: 20,
            pressure_range: SensorRange::new(-10.0, 100.0),
            flow_range: SensorRange::new(-200.0, 200.0),
            fio2_range: SensorRange::new(0.0, 100.0),
            temp_range: SensorRange::new(0.0, 60.0),
            humidity_range: SensorRange::new(0.0, 100.0),

            // Alarms
            pressure_alarm_margin: 5.0,
            alarm_log_capacity: 64,

            // Valves
            valve_frequency_hz: 1500,
            inlet_valve_form: ValveForm::NormallyClosed,
            control_valve_form: ValveForm::NormallyClosed,
        }
    }
}

impl VentConfig {
    /// Read a JSON config.  A missing file yields defaults; anything that
    /// fails to parse or validate is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::config(format!("{}: {e}", path.display()))),
        };
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Breath period in seconds, derived from the breaths-per-minute default.
    pub fn breath_period_sec(&self) -> f32 {
        60.0 / self.breaths_per_minute
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_ramp_steps == 0 {
            return Err(Error::config("n_ramp_steps must be at least 1"));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::config("tick_interval_ms must be non-zero"));
        }
        if self.max_step_budget_ms < self.tick_interval_ms {
            return Err(Error::config("max_step_budget_ms shorter than one tick"));
        }
        if self.sensor_fault_threshold == 0 {
            return Err(Error::config("sensor_fault_threshold must be non-zero"));
        }
        if self.alarm_log_capacity == 0 {
            return Err(Error::config("alarm_log_capacity must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.ramp_seed_base)
            || !(0.0..=1.0).contains(&(self.ramp_seed_base + self.ramp_seed_span))
        {
            return Err(Error::config("ramp seed must stay inside [0, 1]"));
        }
        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !gain.is_finite() {
                return Err(Error::config(format!("{name} must be finite")));
            }
        }
        for (name, r) in [
            ("pressure_range", self.pressure_range),
            ("flow_range", self.flow_range),
            ("fio2_range", self.fio2_range),
            ("temp_range", self.temp_range),
            ("humidity_range", self.humidity_range),
        ] {
            if !(r.min < r.max) {
                return Err(Error::config(format!("{name} is inverted or empty")));
            }
        }
        if !(self.breaths_per_minute > 0.0) {
            return Err(Error::config("breaths_per_minute must be positive"));
        }
        if self.inspiration_time_sec >= self.breath_period_sec() {
            return Err(Error::config(
                "inspiration_time_sec must be shorter than the breath period",
            ));
        }
        if self.valve_frequency_hz == 0 {
            return Err(Error::config("valve_frequency_hz must be non-zero"));
        }
        Ok(())
    }
}
