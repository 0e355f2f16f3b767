//! Per-breath derived measurements.
//!
//! ```text
//!   |◀──────── inspiration ────────▶|◀────── release ──────▶|
//!   ramp ............ hold          release (valve shut)
//!   PIP = max pressure              VTE = ∫|flow| dt
//!                                   PEEP = pressure at end
//!   BPM = 60 / (breath end − breath start)
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BreathMetrics {
    pub pip: f32,
    pub peep: f32,
    /// Exhaled tidal volume (mL).
    pub vte: f32,
    pub breaths_per_minute: f32,
    pub inspiration_time_sec: f32,
}

#[derive(Debug, Default)]
pub struct BreathTracker {
    breath_start_us: u64,
    inspiration_sec: f32,
    peak_pressure: f32,
    exhaled_ml: f32,
    last_flow_us: Option<u64>,
    last: Option<BreathMetrics>,
}

impl BreathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_breath(&mut self, now_us: u64) {
        self.breath_start_us = now_us;
        self.inspiration_sec = 0.0;
        self.peak_pressure = f32::MIN;
        self.exhaled_ml = 0.0;
        self.last_flow_us = None;
    }

    pub fn breath_start_us(&self) -> u64 {
        self.breath_start_us
    }

    /// Seconds since the current breath began.
    pub fn elapsed_sec(&self, now_us: u64) -> f32 {
        now_us.saturating_sub(self.breath_start_us) as f32 / 1_000_000.0
    }

    pub fn observe_inspiration(&mut self, pressure: f32) {
        self.peak_pressure = self.peak_pressure.max(pressure);
    }

    pub fn end_inspiration(&mut self, now_us: u64) {
        self.inspiration_sec = self.elapsed_sec(now_us);
    }

    /// Integrate exhaled flow (L/min) up to `now_us`.
    pub fn observe_release(&mut self, flow: f32, now_us: u64) {
        if let Some(prev) = self.last_flow_us {
            let dt = now_us.saturating_sub(prev) as f32 / 1_000_000.0;
            self.exhaled_ml += flow.abs() * dt / 60.0 * 1000.0;
        }
        self.last_flow_us = Some(now_us);
    }

    pub fn finish(&mut self, pressure: f32, now_us: u64) -> BreathMetrics {
        let period = self.elapsed_sec(now_us);
        let m = BreathMetrics {
            pip: self.peak_pressure.max(0.0),
            peep: pressure,
            vte: self.exhaled_ml,
            breaths_per_minute: if period > 0.0 { 60.0 / period } else { 0.0 },
            inspiration_time_sec: self.inspiration_sec,
        };
        self.last = Some(m);
        m
    }

    /// Measurements of the most recent complete breath.
    pub fn last(&self) -> Option<BreathMetrics> {
        self.last
    }
}
