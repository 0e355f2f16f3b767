//! PID controller for the proportional valve duty cycle
//!
//! Incremental form: each update nudges the held duty cycle by
//!
//! ```text
//!   duty += error·Kp + previous_error·Kd + cumulative_error·Ki
//! ```
//!
//! where `error = target − measured`.  The duty is clamped to the output
//! limits after every update, so integration can never carry it past
//! `[0, 1]`.

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    target: f32,
    duty: f32,
    prev_error: f32,
    cumulative_error: f32,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            target: 0.0,
            duty: 0.0,
            prev_error: 0.0,
            cumulative_error: 0.0,
            output_min: 0.0,
            output_max: 1.0,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
        self.duty = self.duty.clamp(min, max);
    }

    /// Update target
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Replace the held duty cycle with an initial estimate.
    pub fn seed(&mut self, duty: f32) {
        self.duty = duty.clamp(self.output_min, self.output_max);
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }

    /// Fold one measurement into the duty cycle and return it, clamped.
    pub fn update(&mut self, measured: f32) -> f32 {
        let error = self.target - measured;

        let delta = error * self.kp + self.prev_error * self.kd + self.cumulative_error * self.ki;
        if delta.is_finite() {
            self.duty = (self.duty + delta).clamp(self.output_min, self.output_max);
        }

        self.prev_error = error;
        self.cumulative_error += error;

        self.duty
    }

    /// Reset error history.  The held duty is kept.
    pub fn reset(&mut self) {
        self.prev_error = 0.0;
        self.cumulative_error = 0.0;
    }
}
