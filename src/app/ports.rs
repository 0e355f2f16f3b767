//! Port traits: the hexagonal boundary between control logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlModule (domain)
//! ```
//!
//! Driven adapters (sensors, actuators, clocks, event sinks) implement these
//! traits.  The [`ControlModule`](crate::control::module::ControlModule)
//! consumes them via generics, so the control core never touches hardware
//! directly and runs unchanged against the simulated plant.

use core::time::Duration;

use crate::error::{Result, SensorError};
use crate::message::ValueName;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → pin / PWM driver)
// ───────────────────────────────────────────────────────────────

/// Narrow capability set of one actuator line.
///
/// Digital lines carry levels `0.0`/`1.0`; PWM lines carry a duty cycle in
/// `[0, 1]`.  The transport below (GPIO register, pin daemon, simulator) is
/// invisible to the valve layer.
pub trait ActuatorPort {
    /// Read back the current level or duty cycle.
    fn read(&mut self) -> Result<f32>;

    /// Write a level or duty cycle.  Completes once started.
    fn write(&mut self, value: f32) -> Result<()>;

    /// Set the PWM drive frequency.  Digital-only lines reject this.
    fn set_frequency(&mut self, hz: u32) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw per-channel sensor access.  Validation, history and fault
/// escalation happen above this port in the sensor hub.
pub trait SensorPort {
    fn read(&mut self, name: ValueName) -> core::result::Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Flow control port (domain → valve pair)
// ───────────────────────────────────────────────────────────────

/// What the control loop needs from the valve side of the hardware.
pub trait FlowControlPort {
    /// Drive the proportional valve to `pct` in `[0, 100]`, opening or
    /// closing the inlet valve to match.
    fn set_flow_setpoint(&mut self, pct: f32) -> Result<()>;

    /// Current proportional setpoint as read back from the valve.
    fn flow_setpoint(&mut self) -> Result<f32>;

    /// Close every valve.  Called once when the loop exits.
    fn shutdown(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for the loop.  Tests substitute a simulated clock so that
/// multi-second breaths run in microseconds of real time.
pub trait Clock: Send + Sync {
    /// Microseconds since the UNIX epoch.
    fn now_us(&self) -> u64;

    /// Block the loop thread for `d`.
    fn sleep(&self, d: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The control loop emits structured [`LoopEvent`](super::events::LoopEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink: Send {
    fn emit(&mut self, event: &super::events::LoopEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &super::events::LoopEvent) {}
}
