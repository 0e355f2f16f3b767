//! Shared mutable context threaded through every phase handler.
//!
//! `FsmContext` is the single struct that phase handlers read from and
//! write to.  It contains the latest sensor snapshot, the valve command,
//! the PID state, timing information, configuration and the breath
//! settings.  Think of it as the "blackboard" in a blackboard architecture.

use crate::app::events::LoopEvent;
use crate::config::VentConfig;
use crate::control::breath::BreathTracker;
use crate::control::pid::PidController;
use crate::control::settings::BreathParameters;
use crate::sensors::RawSnapshot;

/// Progress through the ramp phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RampState {
    /// Current step, `0..=n_ramp_steps`.
    pub step: u32,
    pub step_started_us: u64,
    /// Consecutive ticks with |error| inside tolerance.
    pub converged_ticks: u32,
}

/// The shared context passed to every phase handler.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current phase was entered.
    pub ticks_in_phase: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Clock reading for this tick (µs).  Set by the loop before each tick.
    pub now_us: u64,
    pub phase_entered_us: u64,

    // -- Sensor data --
    /// Latest verified readings.  Updated before each FSM tick.
    pub sensors: RawSnapshot,

    // -- Actuator output --
    /// Proportional valve setpoint in `[0, 100]` to write after the tick.
    pub command_pct: f32,

    // -- Control --
    pub pid: PidController,
    pub ramp: RampState,
    pub tracker: BreathTracker,
    /// Set when the last hold phase ended short of PIP by more than the
    /// alarm margin.
    pub target_missed: bool,

    // -- Configuration --
    pub config: VentConfig,
    /// Latest authoritative settings, refreshed by the loop every tick.
    pub pending: BreathParameters,
    /// Settings latched at the start of the current breath.
    pub breath: BreathParameters,

    // -- Outbound --
    /// Events produced during this tick, drained by the loop.
    pub events: Vec<LoopEvent>,
}

impl FsmContext {
    pub fn new(config: VentConfig) -> Self {
        let mut pid = PidController::new(config.kp, config.ki, config.kd);
        pid.set_limits(0.0, 1.0);
        let params = BreathParameters::from_config(&config);
        Self {
            ticks_in_phase: 0,
            total_ticks: 0,
            now_us: 0,
            phase_entered_us: 0,
            sensors: RawSnapshot::default(),
            command_pct: 0.0,
            pid,
            ramp: RampState::default(),
            tracker: BreathTracker::new(),
            target_missed: false,
            config,
            pending: params,
            breath: params,
            events: Vec::new(),
        }
    }

    /// Seconds elapsed since the current phase was entered.
    pub fn secs_in_phase(&self) -> f32 {
        self.now_us.saturating_sub(self.phase_entered_us) as f32 / 1_000_000.0
    }

    /// Wall-clock budget of one ramp step (µs).
    pub fn step_budget_us(&self) -> u64 {
        let steps = u64::from(self.config.n_ramp_steps) + 1;
        let share = (f64::from(self.breath.pip_time.value) * 1_000_000.0) as u64 / steps;
        share.min(self.config.max_step_budget_ms * 1_000)
    }

    /// Drive the command from a duty cycle, clamped to `[0, 100]`.
    pub fn command_duty(&mut self, duty: f32) {
        let duty = if duty.is_finite() { duty.clamp(0.0, 1.0) } else { 0.0 };
        self.command_pct = (duty * 100.0).clamp(0.0, 100.0);
    }
}
