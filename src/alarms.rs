//! Alarm manager.
//!
//! The manager runs **every tick after the FSM** and keeps the set of
//! active alarms plus a bounded log of every alarm raised.
//!
//! ## Alarm lifecycle
//!
//! 1. A condition crosses its threshold; an [`Alarm`] is created active,
//!    stamped with the start time, and appended to the log.
//! 2. Each tick the manager re-evaluates.  When the condition clears, the
//!    alarm leaves the active set and its log entry is updated in place
//!    with the end time.
//! 3. The log keeps resolved alarms until `clear_log` or until they are
//!    pushed out by newer entries.
//!
//! | Alarm                     | Severity | Condition                         |
//! |---------------------------|----------|-----------------------------------|
//! | `<CHANNEL>_SENSOR_FAULT`  | Red      | channel past failure threshold    |
//! | `HIGH_PRESSURE`           | Orange   | pressure > PIP + margin           |
//! | `PIP_NOT_REACHED`         | Yellow   | hold ended below PIP − margin     |

use std::collections::{BTreeMap, VecDeque};

use log::{info, warn};

use crate::app::events::LoopEvent;
use crate::message::{Alarm, AlarmSeverity, Timestamp, ValueName};
use crate::sensors::MEASURED;

pub const HIGH_PRESSURE: &str = "HIGH_PRESSURE";
pub const PIP_NOT_REACHED: &str = "PIP_NOT_REACHED";

pub fn sensor_fault_alarm(name: ValueName) -> String {
    format!("{name}_SENSOR_FAULT")
}

/// Everything the alarm conditions look at on one tick.
#[derive(Debug, Clone, Copy)]
pub struct AlarmInputs<'a> {
    pub pressure: f32,
    pub pip_setting: f32,
    pub faulted: &'a [ValueName],
    pub target_missed: bool,
}

pub struct AlarmManager {
    active: BTreeMap<String, Alarm>,
    log: VecDeque<Alarm>,
    capacity: usize,
    margin: f32,
}

impl AlarmManager {
    pub fn new(capacity: usize, pressure_margin: f32) -> Self {
        Self {
            active: BTreeMap::new(),
            log: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            margin: pressure_margin,
        }
    }

    /// Evaluate all alarm conditions.  Returns the raise/clear events.
    pub fn evaluate(&mut self, inputs: &AlarmInputs<'_>, now: Timestamp) -> Vec<LoopEvent> {
        let mut events = Vec::new();

        // ── Sensor faults ─────────────────────────────────────────
        for name in MEASURED {
            self.eval_alarm(
                &sensor_fault_alarm(name),
                AlarmSeverity::Red,
                inputs.faulted.contains(&name),
                now,
                &mut events,
            );
        }

        // ── Over-pressure ─────────────────────────────────────────
        self.eval_alarm(
            HIGH_PRESSURE,
            AlarmSeverity::Orange,
            inputs.pressure > inputs.pip_setting + self.margin,
            now,
            &mut events,
        );

        // ── Missed target ─────────────────────────────────────────
        self.eval_alarm(
            PIP_NOT_REACHED,
            AlarmSeverity::Yellow,
            inputs.target_missed,
            now,
            &mut events,
        );

        events
    }

    pub fn active(&self) -> BTreeMap<String, Alarm> {
        self.active.clone()
    }

    /// Logged alarms, oldest first.
    pub fn logged(&self) -> Vec<Alarm> {
        self.log.iter().cloned().collect()
    }

    pub fn clear_log(&mut self) {
        info!("alarm log cleared ({} entries)", self.log.len());
        self.log.clear();
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Raise or clear one alarm based on a boolean condition.
    fn eval_alarm(
        &mut self,
        name: &str,
        severity: AlarmSeverity,
        condition: bool,
        now: Timestamp,
        events: &mut Vec<LoopEvent>,
    ) {
        if condition {
            if self.active.contains_key(name) {
                return;
            }
            warn!("ALARM SET: {name} ({severity:?})");
            let alarm = Alarm {
                alarm_name: name.to_string(),
                is_active: true,
                severity,
                alarm_start_time: now,
                alarm_end_time: None,
            };
            if self.log.len() >= self.capacity {
                self.log.pop_front();
            }
            self.log.push_back(alarm.clone());
            self.active.insert(name.to_string(), alarm);
            events.push(LoopEvent::AlarmRaised {
                name: name.to_string(),
                severity,
            });
        } else if let Some(alarm) = self.active.remove(name) {
            info!("ALARM CLEARED: {name}");
            if let Some(entry) = self.log.iter_mut().rev().find(|a| {
                a.alarm_name == alarm.alarm_name && a.alarm_start_time == alarm.alarm_start_time
            }) {
                entry.is_active = false;
                entry.alarm_end_time = Some(now);
            }
            events.push(LoopEvent::AlarmCleared {
                name: name.to_string(),
            });
        }
    }
}
