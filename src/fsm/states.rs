//! Concrete phase handler functions and table builder.
//!
//! Each phase is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch.
//!
//! ```text
//!  RAMP ──[last step done]──▶ HOLD ──[inspiration time]──▶ RELEASE
//!    ▲                                                        │
//!    └─────────────[settle time and breath period]────────────┘
//! ```
//!
//! Ramp step `i` of `n` targets `PIP·i/n` and seeds the duty cycle at
//! `base + span·i/n`; the PID then corrects the duty every tick until the
//! step converges or its time budget runs out.

use super::context::{FsmContext, RampState};
use super::{PhaseDescriptor, PhaseId};
use crate::app::events::LoopEvent;
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static phase table.  Called once per loop start.
pub fn build_phase_table() -> [PhaseDescriptor; PhaseId::COUNT] {
    [
        // Index 0: Ramp
        PhaseDescriptor {
            id: PhaseId::Ramp,
            name: "Ramp",
            on_enter: Some(ramp_enter),
            on_exit: None,
            on_update: ramp_update,
        },
        // Index 1: Hold
        PhaseDescriptor {
            id: PhaseId::Hold,
            name: "Hold",
            on_enter: Some(hold_enter),
            on_exit: Some(hold_exit),
            on_update: hold_update,
        },
        // Index 2: Release
        PhaseDescriptor {
            id: PhaseId::Release,
            name: "Release",
            on_enter: Some(release_enter),
            on_exit: None,
            on_update: release_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  RAMP phase: stepping the valve up to PIP
// ═══════════════════════════════════════════════════════════════════════════

fn ramp_enter(ctx: &mut FsmContext) {
    // Settings changed mid-breath take effect here.
    ctx.breath = ctx.pending;
    ctx.tracker.begin_breath(ctx.now_us);
    ctx.ramp = RampState::default();
    info!(
        "RAMP: PIP {:.1} in {} steps, {} ms per step",
        ctx.breath.pip.value,
        ctx.config.n_ramp_steps,
        ctx.step_budget_us() / 1_000
    );
    begin_step(ctx);
}

fn begin_step(ctx: &mut FsmContext) {
    let n = ctx.config.n_ramp_steps.max(1) as f32;
    let i = ctx.ramp.step as f32;
    let setpoint = ctx.breath.pip.value / n * i;
    let seed = ctx.config.ramp_seed_span / n * i + ctx.config.ramp_seed_base;

    ctx.pid.reset();
    ctx.pid.set_target(setpoint);
    ctx.pid.seed(seed);
    ctx.command_duty(ctx.pid.duty());

    ctx.ramp.step_started_us = ctx.now_us;
    ctx.ramp.converged_ticks = 0;
    ctx.events.push(LoopEvent::RampStep {
        step: ctx.ramp.step,
        setpoint,
        duty: ctx.pid.duty(),
    });
}

fn ramp_update(ctx: &mut FsmContext) -> Option<PhaseId> {
    let pressure = ctx.sensors.pressure;
    ctx.tracker.observe_inspiration(pressure);

    let duty = ctx.pid.update(pressure);
    ctx.command_duty(duty);

    if (ctx.pid.target() - pressure).abs() <= ctx.config.ramp_tolerance {
        ctx.ramp.converged_ticks += 1;
    } else {
        ctx.ramp.converged_ticks = 0;
    }

    let elapsed = ctx.now_us.saturating_sub(ctx.ramp.step_started_us);
    let converged = ctx.ramp.converged_ticks >= ctx.config.ramp_converge_ticks;
    if !converged && elapsed < ctx.step_budget_us() {
        return None;
    }

    debug!(
        "RAMP: step {} done ({}), duty {:.3}",
        ctx.ramp.step,
        if converged { "converged" } else { "budget" },
        duty
    );

    if ctx.ramp.step >= ctx.config.n_ramp_steps {
        return Some(PhaseId::Hold);
    }
    ctx.ramp.step += 1;
    begin_step(ctx);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOLD phase: regulating at PIP until inspiration time elapses
// ═══════════════════════════════════════════════════════════════════════════

fn hold_enter(ctx: &mut FsmContext) {
    ctx.pid.set_target(ctx.breath.pip.value);
    info!(
        "HOLD: regulating at {:.1}, duty {:.3}",
        ctx.breath.pip.value,
        ctx.pid.duty()
    );
}

fn hold_update(ctx: &mut FsmContext) -> Option<PhaseId> {
    let pressure = ctx.sensors.pressure;
    ctx.tracker.observe_inspiration(pressure);

    let duty = ctx.pid.update(pressure);
    ctx.command_duty(duty);

    if ctx.tracker.elapsed_sec(ctx.now_us) >= ctx.breath.inspiration_time_sec.value {
        return Some(PhaseId::Release);
    }
    None
}

fn hold_exit(ctx: &mut FsmContext) {
    ctx.tracker.end_inspiration(ctx.now_us);
    let floor = ctx.breath.pip.value - ctx.config.pressure_alarm_margin;
    ctx.target_missed = ctx.sensors.pressure < floor;
    if ctx.target_missed {
        warn!(
            "HOLD: ended at {:.1}, below {:.1}",
            ctx.sensors.pressure, floor
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RELEASE phase: valve shut, exhalation
// ═══════════════════════════════════════════════════════════════════════════

fn release_enter(ctx: &mut FsmContext) {
    ctx.command_pct = 0.0;
    ctx.pid.reset();
    info!("RELEASE: valve shut");
}

fn release_update(ctx: &mut FsmContext) -> Option<PhaseId> {
    ctx.command_pct = 0.0;
    ctx.tracker.observe_release(ctx.sensors.flow, ctx.now_us);

    let settle_sec = ctx.config.release_settle_ms as f32 / 1_000.0;
    let settled = ctx.secs_in_phase() >= settle_sec;
    let period_done = ctx.tracker.elapsed_sec(ctx.now_us) >= ctx.breath.breath_period_sec();
    if !(settled && period_done) {
        return None;
    }

    let metrics = ctx.tracker.finish(ctx.sensors.pressure, ctx.now_us);
    ctx.events.push(LoopEvent::BreathCompleted(metrics));
    Some(PhaseId::Ramp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VentConfig;
    use crate::fsm::Fsm;

    fn run_ramp(cfg: VentConfig, pressure: f32) -> (FsmContext, Vec<LoopEvent>, u64) {
        let mut fsm = Fsm::new(build_phase_table(), PhaseId::Ramp);
        let mut ctx = FsmContext::new(cfg);
        fsm.start(&mut ctx);
        let mut events = core::mem::take(&mut ctx.events);
        let mut ticks = 0;
        while fsm.current_phase() == PhaseId::Ramp && ticks < 100_000 {
            ctx.now_us += ctx.config.tick_interval_ms * 1_000;
            ctx.sensors.pressure = pressure;
            fsm.tick(&mut ctx);
            events.append(&mut ctx.events);
            ticks += 1;
        }
        (ctx, events, ticks)
    }

    #[test]
    fn seeds_span_base_to_full() {
        let (_, events, _) = run_ramp(VentConfig::default(), 0.0);
        let seeds: Vec<(u32, f32, f32)> = events
            .iter()
            .filter_map(|e| match e {
                LoopEvent::RampStep {
                    step,
                    setpoint,
                    duty,
                } => Some((*step, *setpoint, *duty)),
                _ => None,
            })
            .collect();
        assert_eq!(seeds.len(), 6);
        for (i, (step, setpoint, duty)) in seeds.iter().enumerate() {
            assert_eq!(*step as usize, i);
            assert!((setpoint - 5.0 * i as f32).abs() < 1e-4);
            assert!((duty - (0.6 + 0.08 * i as f32)).abs() < 1e-5);
        }
    }

    #[test]
    fn budget_bounds_each_step() {
        let cfg = VentConfig::default();
        let (ctx, _, ticks) = run_ramp(cfg.clone(), 0.0);
        let per_step = ctx.step_budget_us() / (cfg.tick_interval_ms * 1_000);
        assert!(ticks <= (per_step + 1) * u64::from(cfg.n_ramp_steps + 1));
    }

    #[test]
    fn convergence_ends_step_early() {
        let cfg = VentConfig {
            n_ramp_steps: 1,
            pip: 0.0,
            peep: 0.0,
            ..VentConfig::default()
        };
        // Target 0 on both steps and pressure 0: converges on tick 10 each.
        let (_, _, ticks) = run_ramp(cfg.clone(), 0.0);
        assert_eq!(ticks, 2 * u64::from(cfg.ramp_converge_ticks));
    }

    #[test]
    fn missed_target_flagged_at_hold_exit() {
        let mut fsm = Fsm::new(build_phase_table(), PhaseId::Ramp);
        let mut ctx = FsmContext::new(VentConfig::default());
        fsm.start(&mut ctx);
        fsm.force_transition(PhaseId::Hold, &mut ctx);
        ctx.sensors.pressure = 10.0;
        fsm.force_transition(PhaseId::Release, &mut ctx);
        assert!(ctx.target_missed);
    }

    #[test]
    fn pending_settings_latched_at_breath_start() {
        let mut fsm = Fsm::new(build_phase_table(), PhaseId::Ramp);
        let mut ctx = FsmContext::new(VentConfig::default());
        fsm.start(&mut ctx);
        ctx.pending.pip.value = 30.0;
        fsm.force_transition(PhaseId::Hold, &mut ctx);
        assert!((ctx.pid.target() - 25.0).abs() < f32::EPSILON);
        fsm.force_transition(PhaseId::Ramp, &mut ctx);
        assert!((ctx.breath.pip.value - 30.0).abs() < f32::EPSILON);
    }
}
