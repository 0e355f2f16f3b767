//! Mock hardware for integration tests.
//!
//! Records every valve command so tests can assert on the full write
//! history, while a simulated plant answers sensor reads.  All handles are
//! shared so the test keeps observing after the control module has taken
//! ownership of the hardware.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ventcore::adapters::time::SimClock;
use ventcore::app::events::LoopEvent;
use ventcore::app::ports::{Clock, EventSink, FlowControlPort, SensorPort};
use ventcore::config::VentConfig;
use ventcore::control::module::ControlModule;
use ventcore::error::{Error, Result, SensorError};
use ventcore::message::ValueName;
use ventcore::sensors::sim::{PlantHandle, PlantParams, SimPlant};

/// Epoch the simulated clock starts at (µs).
pub const SIM_EPOCH_US: u64 = 1_700_000_000_000_000;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HwCall {
    SetFlow(f32),
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<HwCall>>>);

#[allow(dead_code)]
impl CallLog {
    pub fn snapshot(&self) -> Vec<HwCall> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn last(&self) -> Option<HwCall> {
        self.0.lock().last().copied()
    }
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    plant: SimPlant,
    handle: PlantHandle,
    calls: CallLog,
    setpoint: f32,
}

impl SensorPort for MockHardware {
    fn read(&mut self, name: ValueName) -> core::result::Result<f32, SensorError> {
        self.plant.read(name)
    }
}

impl FlowControlPort for MockHardware {
    fn set_flow_setpoint(&mut self, pct: f32) -> Result<()> {
        if !(0.0..=100.0).contains(&pct) {
            return Err(Error::range("flow setpoint", pct, 0.0, 100.0));
        }
        self.calls.0.lock().push(HwCall::SetFlow(pct));
        self.setpoint = pct;
        self.handle.set_inlet_open(pct > 0.0);
        self.handle.set_valve_setpoint(pct);
        Ok(())
    }

    fn flow_setpoint(&mut self) -> Result<f32> {
        Ok(self.setpoint)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.calls.0.lock().push(HwCall::Shutdown);
        self.setpoint = 0.0;
        self.handle.set_inlet_open(false);
        self.handle.set_valve_setpoint(0.0);
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

/// Loop events stamped with the simulated time they were emitted at.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<(u64, LoopEvent)>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn snapshot(&self) -> Vec<(u64, LoopEvent)> {
        self.0.lock().clone()
    }

    pub fn events(&self) -> Vec<LoopEvent> {
        self.0.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn contains(&self, event: &LoopEvent) -> bool {
        self.0.lock().iter().any(|(_, e)| e == event)
    }
}

struct RecordingSink {
    clock: Arc<SimClock>,
    log: EventLog,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LoopEvent) {
        self.log.0.lock().push((self.clock.now_us(), event.clone()));
    }
}

// ── Rig ───────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct Rig {
    pub module: ControlModule<MockHardware>,
    pub calls: CallLog,
    pub events: EventLog,
    pub plant: PlantHandle,
    pub clock: Arc<SimClock>,
}

pub fn rig(config: VentConfig) -> Rig {
    let clock = Arc::new(SimClock::new(SIM_EPOCH_US));
    let plant = SimPlant::new(clock.clone(), PlantParams::default());
    let handle = plant.handle();
    let calls = CallLog::default();
    let events = EventLog::default();

    let hw = MockHardware {
        plant,
        handle: handle.clone(),
        calls: calls.clone(),
        setpoint: 0.0,
    };
    let sink = RecordingSink {
        clock: clock.clone(),
        log: events.clone(),
    };
    let module = ControlModule::new(hw, config, clock.clone(), Box::new(sink))
        .expect("default config is valid");

    Rig {
        module,
        calls,
        events,
        plant: handle,
        clock,
    }
}

/// Poll `cond` in real time until it holds.
pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..20_000 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("timed out waiting for {what}");
}
