//! Breath-cycle state machine: Ramp, Hold, Release, then Ramp again.
//!
//! ```text
//!              last ramp step done              inspiration time spent
//!   ┌──────┐ ──────────────────────────▶ ┌──────┐ ─────────────────────▶ ┌─────────┐
//!   │ Ramp │                             │ Hold │                        │ Release │
//!   └──────┘ ◀──────────────────────────────────────────────────────────  └─────────┘
//!               settle time and breath period elapsed (new breath)
//! ```
//!
//! - Ramp steps the valve command toward PIP with a freshly seeded PID
//!   per step.
//! - Hold keeps PID regulation at PIP.
//! - Release commands zero and measures exhalation.
//!
//! Each phase is one row of a fixed table of `fn` pointers
//! indexed by [`PhaseId`]; the loop thread calls [`Fsm::tick`] once per
//! sensor read and reads the valve command back out of the shared
//! [`FsmContext`].  Settings proposed mid-breath latch on Ramp entry.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;
use serde::{Deserialize, Serialize};

use crate::app::events::LoopEvent;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Phases of one breath, in the order they run.  The discriminant is the
/// row index in [`states::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PhaseId {
    Ramp = 0,
    Hold = 1,
    Release = 2,
}

impl PhaseId {
    /// Number of phases; sizes the table array.
    pub const COUNT: usize = 3;

    /// Convert a `u8` index back to `PhaseId`.  Out-of-range indices fall
    /// back to `Release`, the phase with the valve shut.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Ramp,
            1 => Self::Hold,
            2 => Self::Release,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Release
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type PhaseActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type PhaseUpdateFn = fn(&mut FsmContext) -> Option<PhaseId>;

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// One row of the breath table.
pub struct PhaseDescriptor {
    pub id: PhaseId,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn>,
    pub on_exit: Option<PhaseActionFn>,
    pub on_update: PhaseUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Runs the breath table.  Owned by the loop thread; never shared.
pub struct Fsm {
    /// Indexed by `PhaseId as usize`.
    table: [PhaseDescriptor; PhaseId::COUNT],
    current: usize,
    tick_count: u64,
    phase_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [PhaseDescriptor; PhaseId::COUNT], initial: PhaseId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "breath table rows out of order"
        );
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            phase_entry_tick: 0,
        }
    }

    /// Enter the first phase of the first breath (normally Ramp, which
    /// latches the settings and seeds step 0).  Call once per loop start.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("breath cycle starting in {}", self.table[self.current].name);
        ctx.phase_entered_us = ctx.now_us;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one sensor tick to the current phase.  A phase that is done
    /// names its successor; the engine then runs its exit action, records a
    /// `PhaseChanged` event and enters the successor in the same tick.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.tick_count += 1;
        ctx.ticks_in_phase = self.tick_count - self.phase_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump straight to `next`, e.g. to Release without finishing the ramp.
    pub fn force_transition(&mut self, next: PhaseId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_phase(&self) -> PhaseId {
        PhaseId::from_index(self.current)
    }

    pub fn ticks_in_current_phase(&self) -> u64 {
        self.tick_count - self.phase_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: PhaseId, ctx: &mut FsmContext) {
        let from = self.current_phase();
        let next_idx = next_id as usize;

        info!(
            "breath phase: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.phase_entry_tick = self.tick_count;
        ctx.ticks_in_phase = 0;
        ctx.phase_entered_us = ctx.now_us;
        ctx.events.push(LoopEvent::PhaseChanged { from, to: next_id });

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::context::FsmContext;
    use super::*;
    use crate::config::VentConfig;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn command_always_in_percent_range(
            pressures in proptest::collection::vec(-10.0f32..100.0, 1..400),
        ) {
            let cfg = VentConfig { kp: 0.05, ki: 0.001, kd: 0.01, ..VentConfig::default() };
            let mut fsm = Fsm::new(states::build_phase_table(), PhaseId::Ramp);
            let mut ctx = FsmContext::new(cfg);
            fsm.start(&mut ctx);
            for p in pressures {
                ctx.now_us += 5_000;
                ctx.sensors.pressure = p;
                fsm.tick(&mut ctx);
                prop_assert!((0.0..=100.0).contains(&ctx.command_pct));
            }
        }
    }
}
