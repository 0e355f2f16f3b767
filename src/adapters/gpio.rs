//! `embedded-hal` actuator adapters.
//!
//! Bridge any HAL that implements the `embedded-hal` 1.0 traits to the
//! [`ActuatorPort`] the valve drivers speak:
//!
//! | Adapter        | Wraps                 | Values       |
//! |----------------|-----------------------|--------------|
//! | `GpioActuator` | `StatefulOutputPin`   | 0.0 / 1.0    |
//! | `PwmActuator`  | `SetDutyCycle`        | `[0, 1]`     |

use embedded_hal::digital::StatefulOutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::app::ports::ActuatorPort;
use crate::error::{ActuatorError, Error, Result};

// ── Digital line ──────────────────────────────────────────────

pub struct GpioActuator<P> {
    pin: P,
}

impl<P: StatefulOutputPin> GpioActuator<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: StatefulOutputPin> ActuatorPort for GpioActuator<P> {
    fn read(&mut self) -> Result<f32> {
        let high = self
            .pin
            .is_set_high()
            .map_err(|_| ActuatorError::ReadFailed)?;
        Ok(if high { 1.0 } else { 0.0 })
    }

    fn write(&mut self, value: f32) -> Result<()> {
        let r = if value == 1.0 {
            self.pin.set_high()
        } else if value == 0.0 {
            self.pin.set_low()
        } else {
            return Err(Error::range("level", value, 0.0, 1.0));
        };
        r.map_err(|_| ActuatorError::WriteFailed.into())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        Err(ActuatorError::FrequencyRejected(hz).into())
    }
}

// ── PWM line ──────────────────────────────────────────────────

/// PWM channel whose timer frequency is fixed when the HAL configures it.
/// `SetDutyCycle` cannot be read back, so the last written duty is cached.
pub struct PwmActuator<P> {
    pwm: P,
    frequency_hz: u32,
    duty: f32,
}

impl<P: SetDutyCycle> PwmActuator<P> {
    pub fn new(pwm: P, frequency_hz: u32) -> Self {
        Self {
            pwm,
            frequency_hz,
            duty: 0.0,
        }
    }
}

impl<P: SetDutyCycle> ActuatorPort for PwmActuator<P> {
    fn read(&mut self) -> Result<f32> {
        Ok(self.duty)
    }

    fn write(&mut self, value: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::range("duty", value, 0.0, 1.0));
        }
        let max = self.pwm.max_duty_cycle();
        let raw = (value * f32::from(max)).round() as u16;
        self.pwm
            .set_duty_cycle(raw.min(max))
            .map_err(|_| Error::from(ActuatorError::WriteFailed))?;
        self.duty = value;
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        if hz == self.frequency_hz {
            Ok(())
        } else {
            Err(ActuatorError::FrequencyRejected(hz).into())
        }
    }
}
