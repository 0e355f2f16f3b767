//! Hardware abstraction layer: bridges sensors and the valve pair to the
//! domain port traits.
//!
//! ```text
//!            ┌──────────────── Hal ────────────────┐
//!  loop ───▶ │ set_flow_setpoint(pct)               │
//!            │   pct > 0  && inlet shut ─▶ open     │──▶ inlet (BinaryValve)
//!            │   pct == 0 && inlet open ─▶ close    │
//!            │   proportional ◀─ pct (rising curve) │──▶ control (ProportionalValve)
//!            │ read(name) ──────────────────────────│──▶ sensors (SensorPort)
//!            └──────────────────────────────────────┘
//! ```
//!
//! Every write and read-back uses the rising calibration column.

use log::{debug, info};

use crate::app::ports::{FlowControlPort, SensorPort};
use crate::drivers::valve::{BinaryValve, ProportionalValve};
use crate::error::{Error, Result, SensorError};
use crate::message::ValueName;

pub struct Hal<S, I, C> {
    sensors: S,
    inlet: I,
    control: C,
}

impl<S, I, C> Hal<S, I, C>
where
    S: SensorPort,
    I: BinaryValve,
    C: ProportionalValve,
{
    pub fn new(sensors: S, inlet: I, control: C) -> Self {
        Self {
            sensors,
            inlet,
            control,
        }
    }

    #[cfg(test)]
    fn inlet_mut(&mut self) -> &mut I {
        &mut self.inlet
    }

    #[cfg(test)]
    fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<S, I, C> SensorPort for Hal<S, I, C>
where
    S: SensorPort,
{
    fn read(&mut self, name: ValueName) -> core::result::Result<f32, SensorError> {
        self.sensors.read(name)
    }
}

// ── FlowControlPort implementation ────────────────────────────

impl<S, I, C> FlowControlPort for Hal<S, I, C>
where
    S: SensorPort,
    I: BinaryValve,
    C: ProportionalValve,
{
    fn set_flow_setpoint(&mut self, pct: f32) -> Result<()> {
        if !(0.0..=100.0).contains(&pct) {
            return Err(Error::range("flow setpoint", pct, 0.0, 100.0));
        }

        if pct > 0.0 && !self.inlet.is_open()? {
            debug!("inlet valve: open");
            self.inlet.open()?;
        } else if pct == 0.0 && self.inlet.is_open()? {
            debug!("inlet valve: close");
            self.inlet.close()?;
        }

        self.control.set_setpoint(pct)
    }

    fn flow_setpoint(&mut self) -> Result<f32> {
        self.control.setpoint()
    }

    fn shutdown(&mut self) -> Result<()> {
        info!("HAL: closing all valves");
        let control = self.control.set_setpoint(0.0);
        let inlet = self.inlet.close();
        control.and(inlet)
    }
}
