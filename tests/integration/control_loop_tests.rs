//! Control loop behaviour against mock hardware: ramp seeding, phase
//! timing, stop latency, snapshot ordering, settings and sensor faults.

use std::time::Duration;

use ventcore::alarms::sensor_fault_alarm;
use ventcore::app::events::LoopEvent;
use ventcore::config::VentConfig;
use ventcore::control::settings::RECOGNIZED;
use ventcore::error::Error;
use ventcore::fsm::PhaseId;
use ventcore::message::{AlarmSeverity, ControlSetting, ValueName};

use crate::mock_hw::{HwCall, rig, wait_for};

fn hold_reached(e: &LoopEvent) -> bool {
    matches!(
        e,
        LoopEvent::PhaseChanged {
            from: PhaseId::Ramp,
            to: PhaseId::Hold
        }
    )
}

// ── Ramp ──────────────────────────────────────────────────────

#[test]
fn ramp_seeds_each_step_and_reaches_hold_within_budget() {
    let cfg = VentConfig::default();
    let n = cfg.n_ramp_steps;
    let r = rig(cfg.clone());

    r.module.start().unwrap();
    wait_for("hold phase", || r.events.events().iter().any(hold_reached));
    r.module.stop().unwrap();

    let log = r.events.snapshot();
    let started_at = log
        .iter()
        .find(|(_, e)| *e == LoopEvent::Started)
        .map(|(t, _)| *t)
        .unwrap();
    let hold_at = log.iter().find(|(_, e)| hold_reached(e)).map(|(t, _)| *t).unwrap();

    let steps: Vec<(u32, f32, f32)> = log
        .iter()
        .take_while(|(_, e)| !hold_reached(e))
        .filter_map(|(_, e)| match e {
            LoopEvent::RampStep {
                step,
                setpoint,
                duty,
            } => Some((*step, *setpoint, *duty)),
            _ => None,
        })
        .collect();

    assert_eq!(steps.len(), n as usize + 1, "one seed per step 0..=n");
    for (i, (step, setpoint, duty)) in steps.iter().enumerate() {
        let i_f = i as f32;
        assert_eq!(*step, i as u32);
        let want_sp = cfg.pip / n as f32 * i_f;
        let want_duty = cfg.ramp_seed_span / n as f32 * i_f + cfg.ramp_seed_base;
        assert!((setpoint - want_sp).abs() < 1e-4, "step {i}: setpoint {setpoint}");
        assert!((duty - want_duty).abs() < 1e-5, "step {i}: duty {duty}");
        assert!((0.6..=1.0).contains(duty));
    }

    // Each step is bounded by its share of the PIP time, plus one tick of
    // detection slack per step.
    let budget_us = (f64::from(cfg.pip_time) * 1e6) as u64;
    let slack_us = (u64::from(n) + 1) * cfg.tick_interval_ms * 1_000;
    assert!(
        hold_at - started_at <= budget_us + slack_us,
        "ramp took {} µs",
        hold_at - started_at
    );
}

#[test]
fn every_valve_command_is_in_range() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("two breaths", || {
        r.events
            .events()
            .iter()
            .filter(|e| matches!(e, LoopEvent::BreathCompleted(_)))
            .count()
            >= 2
    });
    r.module.stop().unwrap();

    for call in r.calls.snapshot() {
        if let HwCall::SetFlow(pct) = call {
            assert!((0.0..=100.0).contains(&pct), "commanded {pct}");
        }
    }
}

#[test]
fn release_shuts_the_valve_and_breath_repeats() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("second ramp", || {
        r.events.events().iter().any(|e| {
            matches!(
                e,
                LoopEvent::PhaseChanged {
                    from: PhaseId::Release,
                    to: PhaseId::Ramp
                }
            )
        })
    });
    r.module.stop().unwrap();

    let metrics = r
        .events
        .events()
        .into_iter()
        .find_map(|e| match e {
            LoopEvent::BreathCompleted(m) => Some(m),
            _ => None,
        })
        .unwrap();
    assert!(metrics.pip > 0.0);
    assert!(metrics.breaths_per_minute > 0.0);
    assert!(metrics.inspiration_time_sec > 0.0);
    assert!(metrics.vte > 0.0);
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn stop_ends_with_shutdown_and_nothing_after() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("some ticks", || r.module.get_sensors().loop_counter > 50);
    r.module.stop().unwrap();

    assert_eq!(r.calls.last(), Some(HwCall::Shutdown));
    let frozen = r.calls.len();
    let counter = r.module.get_sensors().loop_counter;
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(r.calls.len(), frozen, "valve written after stop");
    assert_eq!(r.module.get_sensors().loop_counter, counter);
    assert!(!r.module.is_running());
    assert!(r.events.events().iter().any(|e| matches!(e, LoopEvent::Stopped { .. })));
}

#[test]
fn start_twice_runs_one_loop() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    r.module.start().unwrap();
    wait_for("some ticks", || r.module.get_sensors().loop_counter > 10);
    r.module.stop().unwrap();
    let starts = r
        .events
        .events()
        .iter()
        .filter(|e| **e == LoopEvent::Started)
        .count();
    assert_eq!(starts, 1);
}

#[test]
fn drop_joins_the_loop_thread() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("some ticks", || r.module.get_sensors().loop_counter > 10);
    let calls = r.calls.clone();
    drop(r.module);
    assert_eq!(calls.last(), Some(HwCall::Shutdown));
}

#[test]
fn snapshots_are_ordered() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();

    let mut prev = r.module.get_sensors();
    let mut seen = 0;
    while seen < 200 {
        let cur = r.module.get_sensors();
        if cur.loop_counter != prev.loop_counter {
            assert!(cur.loop_counter > prev.loop_counter);
            assert!(cur.timestamp >= prev.timestamp);
            seen += 1;
            prev = cur;
        }
        std::thread::yield_now();
    }
    r.module.stop().unwrap();
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn out_of_range_setting_refused_at_the_call() {
    let r = rig(VentConfig::default());

    // Admissible on its own terms, but beyond what the controller accepts.
    let err = r
        .module
        .set_control(ControlSetting::new(ValueName::Pip, 90.0, 0.0, 100.0))
        .unwrap_err();
    assert!(matches!(err, Error::Range { .. }));

    r.module.start().unwrap();
    wait_for("lazy init", || r.module.get_control(ValueName::Pip).is_ok());
    let pip = r.module.get_control(ValueName::Pip).unwrap();
    assert_eq!(pip.value, 25.0);

    let err = r
        .module
        .set_control(ControlSetting { value: 70.5, ..pip })
        .unwrap_err();
    assert!(matches!(err, Error::Range { .. }));
    r.module.stop().unwrap();

    assert_eq!(r.module.get_control(ValueName::Pip).unwrap().value, 25.0);
    for e in r.events.events() {
        assert!(!matches!(e, LoopEvent::SettingRejected { .. }));
        if let LoopEvent::SettingApplied {
            name: ValueName::Pip,
            value,
        } = e
        {
            assert!((0.0..=70.0).contains(&value));
        }
    }
}

/// Each setting is adopted on its own, even when the combination looks
/// unusual (inspiration filling the whole breath, PIP under PEEP).
#[test]
fn accepted_settings_are_all_promoted_together() {
    let r = rig(VentConfig::default());
    r.module
        .set_control(ControlSetting::new(ValueName::BreathsPerMinute, 40.0, 4.0, 40.0))
        .unwrap();
    r.module
        .set_control(ControlSetting::new(ValueName::Pip, 2.0, 0.0, 70.0))
        .unwrap();
    r.module.start().unwrap();

    wait_for("promotion", || {
        r.module
            .get_control(ValueName::BreathsPerMinute)
            .is_ok_and(|s| s.value == 40.0)
            && r.module.get_control(ValueName::Pip).is_ok_and(|s| s.value == 2.0)
    });
    let peep = r.module.get_control(ValueName::Peep).unwrap();
    assert!(peep.value > 2.0);

    // The loop keeps breathing on the adopted values.
    let before = r.module.get_sensors().loop_counter;
    wait_for("ticks", || r.module.get_sensors().loop_counter > before + 50);
    r.module.stop().unwrap();
    assert!(
        !r.events
            .events()
            .iter()
            .any(|e| matches!(e, LoopEvent::SettingRejected { .. }))
    );
}

#[test]
fn range_limits_of_every_setting_read_back() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("lazy init", || {
        RECOGNIZED
            .iter()
            .all(|n| r.module.get_control(*n).is_ok())
    });

    for name in RECOGNIZED {
        let current = r.module.get_control(name).unwrap();
        for value in [current.min_value, current.max_value] {
            r.module
                .set_control(ControlSetting { value, ..current })
                .unwrap();
            wait_for("promotion", || {
                r.module.get_control(name).is_ok_and(|s| s.value == value)
            });
        }
    }
    r.module.stop().unwrap();
}

#[test]
fn valid_setting_is_promoted() {
    let r = rig(VentConfig::default());
    r.module.start().unwrap();
    wait_for("lazy init", || r.module.get_control(ValueName::Pip).is_ok());

    let pip = r.module.get_control(ValueName::Pip).unwrap();
    r.module
        .set_control(ControlSetting { value: 30.0, ..pip })
        .unwrap();
    wait_for("promotion", || {
        r.module
            .get_control(ValueName::Pip)
            .is_ok_and(|s| s.value == 30.0)
    });
    let promoted = r.module.get_control(ValueName::Pip).unwrap();
    assert!(promoted.timestamp >= pip.timestamp);
    r.module.stop().unwrap();
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn persistent_sensor_failure_raises_red_alarm_and_error() {
    let r = rig(VentConfig::default());
    let alarm = sensor_fault_alarm(ValueName::Temp);
    r.module.start().unwrap();
    wait_for("some ticks", || r.module.get_sensors().loop_counter > 5);

    r.plant.fail_sensor(ValueName::Temp, true);
    wait_for("fault alarm", || {
        r.module.get_active_alarms().contains_key(&alarm)
    });
    let active = r.module.get_active_alarms();
    assert_eq!(active[&alarm].severity, AlarmSeverity::Red);
    assert!(active[&alarm].is_active);

    let code = Error::SensorFault(ValueName::Temp).code();
    assert!(r.module.errors().iter().any(|e| e.errnum == code));

    // The loop carries on.
    let counter = r.module.get_sensors().loop_counter;
    wait_for("loop still ticking", || {
        r.module.get_sensors().loop_counter > counter + 10
    });

    r.plant.fail_sensor(ValueName::Temp, false);
    wait_for("alarm cleared", || {
        !r.module.get_active_alarms().contains_key(&alarm)
    });
    let logged = r.module.get_logged_alarms();
    let entry = logged.iter().find(|a| a.alarm_name == alarm).unwrap();
    assert!(!entry.is_active);
    assert!(entry.alarm_end_time.is_some());

    r.module.stop().unwrap();
    r.module.clear_logged_alarms();
    assert!(r.module.get_logged_alarms().is_empty());
}
