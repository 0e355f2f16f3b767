//! Simulated airway for running the loop without hardware.
//!
//! ```text
//!   valve setpoint % ──▶ [ first-order lag, τ ] ──▶ pressure
//!   inlet open?      ──┘                        └─▶ flow = C·dP/dt
//! ```
//!
//! Pressure relaxes toward `setpoint% × max_pressure` while the inlet is
//! open and toward zero while it is shut.  The plant advances whenever
//! pressure is read, using the shared clock, so it stays in step with the
//! loop under a simulated clock.  FiO2, temperature and humidity are
//! constants with a small deterministic ripple.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::app::ports::{Clock, SensorPort};
use crate::error::SensorError;
use crate::message::ValueName;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParams {
    /// Pressure reached at 100 % valve setpoint (cmH2O).
    pub max_pressure: f32,
    /// Time constant of the pressure response (s).
    pub tau_s: f32,
    /// Lung compliance (L/cmH2O).
    pub compliance: f32,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            max_pressure: 30.0,
            tau_s: 0.08,
            compliance: 0.05,
        }
    }
}

#[derive(Debug, Default)]
struct PlantState {
    inlet_open: bool,
    valve_setpoint: f32,
    pressure: f32,
    flow: f32,
    last_us: Option<u64>,
    reads: u64,
    failing: BTreeSet<ValueName>,
}

/// Cloneable handle the simulated valves write through.
#[derive(Debug, Clone, Default)]
pub struct PlantHandle(Arc<Mutex<PlantState>>);

impl PlantHandle {
    pub fn set_inlet_open(&self, open: bool) {
        self.0.lock().inlet_open = open;
    }

    pub fn set_valve_setpoint(&self, pct: f32) {
        self.0.lock().valve_setpoint = pct;
    }

    pub fn inlet_open(&self) -> bool {
        self.0.lock().inlet_open
    }

    pub fn valve_setpoint(&self) -> f32 {
        self.0.lock().valve_setpoint
    }

    pub fn pressure(&self) -> f32 {
        self.0.lock().pressure
    }

    /// Make every read of `name` fail until cleared.
    pub fn fail_sensor(&self, name: ValueName, failing: bool) {
        let mut s = self.0.lock();
        if failing {
            s.failing.insert(name);
        } else {
            s.failing.remove(&name);
        }
    }
}

pub struct SimPlant {
    handle: PlantHandle,
    params: PlantParams,
    clock: Arc<dyn Clock>,
}

impl SimPlant {
    pub fn new(clock: Arc<dyn Clock>, params: PlantParams) -> Self {
        Self {
            handle: PlantHandle::default(),
            params,
            clock,
        }
    }

    pub fn handle(&self) -> PlantHandle {
        self.handle.clone()
    }

    fn advance(&self, s: &mut PlantState) {
        let now = self.clock.now_us();
        let Some(last) = s.last_us.replace(now) else {
            return;
        };
        let dt = now.saturating_sub(last) as f32 / 1_000_000.0;
        if dt <= 0.0 {
            return;
        }
        let target = if s.inlet_open {
            s.valve_setpoint / 100.0 * self.params.max_pressure
        } else {
            0.0
        };
        let alpha = 1.0 - (-dt / self.params.tau_s).exp();
        let dp = (target - s.pressure) * alpha;
        s.pressure += dp;
        // L/min
        s.flow = self.params.compliance * dp / dt * 60.0;
    }
}

impl SensorPort for SimPlant {
    fn read(&mut self, name: ValueName) -> Result<f32, SensorError> {
        let mut s = self.handle.0.lock();
        if s.failing.contains(&name) {
            return Err(SensorError::ReadFailed);
        }
        s.reads = s.reads.wrapping_add(1);
        let ripple = ((s.reads % 16) as f32 - 7.5) * 0.01;
        match name {
            ValueName::Pressure => {
                self.advance(&mut s);
                Ok(s.pressure)
            }
            ValueName::Flow => Ok(s.flow),
            ValueName::Fio2 => Ok(21.0 + ripple),
            ValueName::Temp => Ok(34.0 + ripple),
            ValueName::Humidity => Ok(60.0 + ripple),
            _ => Err(SensorError::NotInstalled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::SimClock;
    use core::time::Duration;

    fn plant() -> (SimPlant, Arc<SimClock>) {
        let clock = Arc::new(SimClock::new(0));
        (SimPlant::new(clock.clone(), PlantParams::default()), clock)
    }

    #[test]
    fn pressure_rises_toward_target_when_open() {
        let (mut p, clock) = plant();
        let h = p.handle();
        h.set_inlet_open(true);
        h.set_valve_setpoint(50.0);
        p.read(ValueName::Pressure).unwrap();
        for _ in 0..200 {
            clock.sleep(Duration::from_millis(5));
            p.read(ValueName::Pressure).unwrap();
        }
        assert!((p.read(ValueName::Pressure).unwrap() - 15.0).abs() < 0.1);
    }

    #[test]
    fn closed_inlet_decays_pressure() {
        let (mut p, clock) = plant();
        let h = p.handle();
        h.set_inlet_open(true);
        h.set_valve_setpoint(100.0);
        p.read(ValueName::Pressure).unwrap();
        clock.sleep(Duration::from_millis(500));
        let high = p.read(ValueName::Pressure).unwrap();
        h.set_inlet_open(false);
        clock.sleep(Duration::from_millis(500));
        let low = p.read(ValueName::Pressure).unwrap();
        assert!(low < high * 0.1);
        assert!(p.read(ValueName::Flow).unwrap() < 0.0);
    }

    #[test]
    fn injected_failure_reported() {
        let (mut p, _clock) = plant();
        p.handle().fail_sensor(ValueName::Temp, true);
        assert_eq!(p.read(ValueName::Temp), Err(SensorError::ReadFailed));
        p.handle().fail_sensor(ValueName::Temp, false);
        assert!(p.read(ValueName::Temp).is_ok());
    }

    #[test]
    fn settings_only_names_not_installed() {
        let (mut p, _clock) = plant();
        assert_eq!(p.read(ValueName::PipTime), Err(SensorError::NotInstalled));
    }
}
