//! In-memory actuator for simulation and tests.
//!
//! Clones share one state, so a test can hand one clone to a valve and keep
//! another to observe what was written.  Only the most recent
//! [`WRITE_LOG_LEN`] writes are kept.

use std::sync::Arc;

use heapless::HistoryBuffer;
use parking_lot::Mutex;

use crate::app::ports::ActuatorPort;
use crate::error::{ActuatorError, Error, Result};

pub const WRITE_LOG_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Digital,
    Pwm,
}

#[derive(Debug)]
struct State {
    line: Line,
    value: f32,
    frequency: Option<u32>,
    writes: HistoryBuffer<f32, WRITE_LOG_LEN>,
    fail_writes: bool,
}

#[derive(Debug, Clone)]
pub struct SimActuator(Arc<Mutex<State>>);

impl SimActuator {
    fn with_line(line: Line) -> Self {
        Self(Arc::new(Mutex::new(State {
            line,
            value: 0.0,
            frequency: None,
            writes: HistoryBuffer::new(),
            fail_writes: false,
        })))
    }

    /// Level line: accepts 0 or 1, no frequency.
    pub fn digital() -> Self {
        Self::with_line(Line::Digital)
    }

    /// PWM line: accepts a duty cycle in `[0, 1]`.
    pub fn pwm() -> Self {
        Self::with_line(Line::Pwm)
    }

    pub fn value(&self) -> f32 {
        self.0.lock().value
    }

    pub fn frequency(&self) -> Option<u32> {
        self.0.lock().frequency
    }

    /// Recent accepted writes, oldest first.
    pub fn writes(&self) -> Vec<f32> {
        self.0.lock().writes.oldest_ordered().copied().collect()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.0.lock().fail_writes = fail;
    }
}

impl ActuatorPort for SimActuator {
    fn read(&mut self) -> Result<f32> {
        Ok(self.0.lock().value)
    }

    fn write(&mut self, value: f32) -> Result<()> {
        let mut s = self.0.lock();
        if s.fail_writes {
            return Err(ActuatorError::WriteFailed.into());
        }
        match s.line {
            Line::Digital if value != 0.0 && value != 1.0 => {
                return Err(Error::range("level", value, 0.0, 1.0));
            }
            Line::Pwm if !(0.0..=1.0).contains(&value) => {
                return Err(Error::range("duty", value, 0.0, 1.0));
            }
            _ => {}
        }
        s.value = value;
        s.writes.write(value);
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        let mut s = self.0.lock();
        if s.line == Line::Digital || hz == 0 {
            return Err(ActuatorError::FrequencyRejected(hz).into());
        }
        s.frequency = Some(hz);
        Ok(())
    }
}
