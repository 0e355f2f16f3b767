//! One verified sensor channel.
//!
//! Wraps the raw readings of a single quantity with:
//!
//! - a zero offset, found by averaging samples at rest,
//! - range verification against the plausible span,
//! - a bounded history of accepted observations,
//! - last-known-good fallback and a consecutive-failure counter.
//!
//! A rejected reading never reaches the control loop; it sees the last
//! good value instead until the failure count crosses the fault threshold.

use heapless::HistoryBuffer;
use log::debug;

use crate::app::ports::SensorPort;
use crate::config::SensorRange;
use crate::error::{Error, Result, SensorError};
use crate::message::ValueName;

/// Observations retained per channel.
pub const HISTORY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub value: f32,
    pub timestamp_us: u64,
}

pub struct SensorChannel {
    name: ValueName,
    range: SensorRange,
    offset: f32,
    history: HistoryBuffer<Observation, HISTORY_LEN>,
    last_good: f32,
    consecutive_failures: u32,
}

impl SensorChannel {
    pub fn new(name: ValueName, range: SensorRange) -> Self {
        Self {
            name,
            range,
            offset: 0.0,
            history: HistoryBuffer::new(),
            last_good: 0.0,
            consecutive_failures: 0,
        }
    }

    pub fn name(&self) -> ValueName {
        self.name
    }

    /// Fold one raw reading in.  Returns `true` if it was accepted.
    pub fn update(&mut self, raw: core::result::Result<f32, SensorError>, now_us: u64) -> bool {
        let verified = raw.and_then(|v| {
            let v = v - self.offset;
            if self.range.contains(v) {
                Ok(v)
            } else {
                Err(SensorError::OutOfRange)
            }
        });

        match verified {
            Ok(value) => {
                self.history.write(Observation {
                    value,
                    timestamp_us: now_us,
                });
                self.last_good = value;
                self.consecutive_failures = 0;
                true
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                debug!(
                    "{}: {e}, using last good {:.3} ({} in a row)",
                    self.name, self.last_good, self.consecutive_failures
                );
                false
            }
        }
    }

    /// Last accepted value (zero before the first).
    pub fn get(&self) -> f32 {
        self.last_good
    }

    /// Time since the last accepted reading, `None` before the first.
    pub fn age_us(&self, now_us: u64) -> Option<u64> {
        self.history
            .recent()
            .map(|o| now_us.saturating_sub(o.timestamp_us))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Accepted observations, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Observation> {
        self.history.oldest_ordered()
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Drop history and failure count.  The offset is kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_good = 0.0;
        self.consecutive_failures = 0;
    }

    /// Average `samples` raw readings taken at rest and use the mean as the
    /// zero offset.  Failed reads are skipped; if none succeed the offset
    /// is left untouched.
    pub fn calibrate<P: SensorPort + ?Sized>(&mut self, port: &mut P, samples: usize) -> Result<f32> {
        let mut sum = 0.0f64;
        let mut n = 0u32;
        for _ in 0..samples {
            if let Ok(v) = port.read(self.name) {
                if v.is_finite() {
                    sum += f64::from(v);
                    n += 1;
                }
            }
        }
        if n == 0 {
            return Err(Error::SensorFault(self.name));
        }
        self.offset = (sum / f64::from(n)) as f32;
        self.reset();
        Ok(self.offset)
    }
}
