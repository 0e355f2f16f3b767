//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured loop events through the
//! `log` facade.  A GUI bridge would implement the same trait.

use log::{debug, error, info, warn};

use crate::app::events::LoopEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LoopEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LoopEvent) {
        match event {
            LoopEvent::Started => info!("LOOP | started"),
            LoopEvent::Stopped { loop_counter } => {
                info!("LOOP | stopped after {loop_counter} ticks");
            }
            LoopEvent::PhaseChanged { from, to } => info!("PHASE | {from:?} -> {to:?}"),
            LoopEvent::RampStep {
                step,
                setpoint,
                duty,
            } => debug!("RAMP | step={step} target={setpoint:.2} seed={duty:.3}"),
            LoopEvent::BreathCompleted(m) => info!(
                "BREATH | PIP={:.1} PEEP={:.1} VTE={:.0}mL BPM={:.1} Ti={:.2}s",
                m.pip, m.peep, m.vte, m.breaths_per_minute, m.inspiration_time_sec
            ),
            LoopEvent::AlarmRaised { name, severity } => {
                warn!("ALARM | {name} raised ({severity:?})");
            }
            LoopEvent::AlarmCleared { name } => info!("ALARM | {name} cleared"),
            LoopEvent::SensorFault(name) => error!("FAULT | sensor {name}"),
            LoopEvent::SettingApplied { name, value } => info!("SETTING | {name}={value}"),
            LoopEvent::SettingRejected { name, value } => {
                warn!("SETTING | {name}={value} rejected");
            }
        }
    }
}
