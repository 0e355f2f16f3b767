//! Outbound control-loop events.
//!
//! The [`ControlModule`](crate::control::module::ControlModule) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to the console, forward to a
//! GUI, or record them in a test.

use crate::control::breath::BreathMetrics;
use crate::fsm::PhaseId;
use crate::message::{AlarmSeverity, ValueName};

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// The loop thread started.
    Started,

    /// The loop thread observed the stop flag and exited.
    Stopped { loop_counter: u64 },

    /// The breath state machine moved between phases.
    PhaseChanged { from: PhaseId, to: PhaseId },

    /// A ramp step began with the given pressure target and duty seed.
    RampStep { step: u32, setpoint: f32, duty: f32 },

    /// A breath finished; carries the derived measurements.
    BreathCompleted(BreathMetrics),

    AlarmRaised {
        name: String,
        severity: AlarmSeverity,
    },

    AlarmCleared { name: String },

    /// A sensor channel exceeded its consecutive-failure threshold.
    SensorFault(ValueName),

    /// A tentative setting was promoted to authoritative.
    SettingApplied { name: ValueName, value: f32 },

    /// A tentative setting was refused by the controller.
    SettingRejected { name: ValueName, value: f32 },
}
