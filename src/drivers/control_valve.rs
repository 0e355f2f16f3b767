//! Hardware valve drivers over an [`ActuatorPort`].
//!
//! - [`OnOffValve`]: solenoid on a digital line, polarity from its form.
//! - [`PwmControlValve`]: proportional valve on a PWM line.  Setpoints go
//!   through the calibrated [`ResponseCurve`]; the raw duty cycle is what
//!   the actuator sees.
//!
//! Both drivers are dumb actuators.  Sequencing (inlet before proportional,
//! zeroing on exit) lives in the HAL.

use log::debug;

use super::response::{CalibrationSource, Direction, ResponseCurve};
use super::valve::{BinaryValve, ProportionalValve, ValveForm};
use crate::app::ports::ActuatorPort;
use crate::error::Result;

/// Default PWM drive frequency of the proportional valve.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 1500;

// ---------------------------------------------------------------------------
// On/off solenoid
// ---------------------------------------------------------------------------

pub struct OnOffValve<A> {
    actuator: A,
    form: ValveForm,
}

impl<A: ActuatorPort> OnOffValve<A> {
    pub fn new(actuator: A, form: ValveForm) -> Self {
        Self { actuator, form }
    }

    pub fn form(&self) -> ValveForm {
        self.form
    }

    pub fn into_inner(self) -> A {
        self.actuator
    }
}

impl<A: ActuatorPort> BinaryValve for OnOffValve<A> {
    fn open(&mut self) -> Result<()> {
        self.actuator.write(self.form.open_level())
    }

    fn close(&mut self) -> Result<()> {
        self.actuator.write(self.form.closed_level())
    }

    fn is_open(&mut self) -> Result<bool> {
        let level = self.actuator.read()?;
        Ok(self.form.is_open_level(level))
    }
}

// ---------------------------------------------------------------------------
// PWM proportional valve
// ---------------------------------------------------------------------------

pub struct PwmControlValve<A> {
    actuator: A,
    form: ValveForm,
    curve: ResponseCurve,
}

impl<A: ActuatorPort> PwmControlValve<A> {
    /// Load the calibration table, set the drive frequency and park the
    /// valve closed.
    pub fn new<S: CalibrationSource + ?Sized>(
        mut actuator: A,
        form: ValveForm,
        calibration: &S,
        frequency_hz: Option<u32>,
    ) -> Result<Self> {
        let curve = ResponseCurve::from_source(calibration)?;
        let hz = frequency_hz.unwrap_or(DEFAULT_PWM_FREQUENCY_HZ);
        actuator.set_frequency(hz)?;
        debug!(
            "control valve: {} rows, {hz} Hz, {form}",
            curve.rows().len()
        );
        let mut valve = Self {
            actuator,
            form,
            curve,
        };
        valve.write_duty(0.0)?;
        Ok(valve)
    }

    pub fn curve(&self) -> &ResponseCurve {
        &self.curve
    }

    pub fn into_inner(self) -> A {
        self.actuator
    }

    /// Logical duty cycle (fraction of full opening drive).
    pub fn duty(&mut self) -> Result<f32> {
        let raw = self.actuator.read()?;
        Ok(match self.form {
            ValveForm::NormallyClosed => raw,
            ValveForm::NormallyOpen => 1.0 - raw,
        })
    }

    fn write_duty(&mut self, duty: f32) -> Result<()> {
        let duty = duty.clamp(0.0, 1.0);
        let raw = match self.form {
            ValveForm::NormallyClosed => duty,
            ValveForm::NormallyOpen => 1.0 - duty,
        };
        self.actuator.write(raw)
    }
}

impl<A: ActuatorPort> ProportionalValve for PwmControlValve<A> {
    fn setpoint_toward(&mut self, dir: Direction) -> Result<f32> {
        let duty = self.duty()?;
        Ok(self.curve.setpoint_for(duty, dir))
    }

    fn set_setpoint_toward(&mut self, sp: f32, dir: Direction) -> Result<()> {
        let duty = self.curve.duty_for(sp, dir)?;
        self.write_duty(duty)
    }
}

impl<A: ActuatorPort> BinaryValve for PwmControlValve<A> {
    fn open(&mut self) -> Result<()> {
        self.write_duty(1.0)
    }

    fn close(&mut self) -> Result<()> {
        self.write_duty(0.0)
    }

    fn is_open(&mut self) -> Result<bool> {
        Ok(self.duty()? > 0.0)
    }
}
