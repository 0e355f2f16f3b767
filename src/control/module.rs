//! Control module: owns the loop thread and the state it shares.
//!
//! ```text
//!   caller threads                       loop thread (one tick)
//!   ──────────────                       ──────────────────────
//!   set_control ──▶ tentative ─┐         1. sync settings  ◀── lock, copy, unlock
//!                              ├─ lock ─▶    apply to controller (no lock)
//!   get_control ◀── control ◀──┘         2. read sensors    (no lock)
//!   get_sensors ◀── sensor_values        3. FSM tick
//!   alarms      ◀── AlarmManager         4. valve write     (no lock)
//!                                        5. publish snapshot + alarms ◀── lock
//! ```
//!
//! Locks are held only for map copies; hardware I/O always happens with
//! the lock released.  The loop thread is the only writer of the
//! authoritative settings and the sensor snapshot.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::alarms::{AlarmInputs, AlarmManager};
use crate::app::events::LoopEvent;
use crate::app::ports::{Clock, EventSink, FlowControlPort, SensorPort};
use crate::config::VentConfig;
use crate::control::settings::{BreathParameters, RECOGNIZED};
use crate::error::{Error, Result};
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_phase_table;
use crate::fsm::{Fsm, PhaseId};
use crate::message::{Alarm, ControlSetting, ErrorRecord, SensorValues, Timestamp, ValueName};
use crate::sensors::{RawSnapshot, SensorHub};

/// Hardware the loop drives: sensors in, valves out.
pub trait ControlHardware: SensorPort + FlowControlPort + Send + 'static {}

impl<T: SensorPort + FlowControlPort + Send + 'static> ControlHardware for T {}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared {
    sensor_values: SensorValues,
    control_settings: BTreeMap<ValueName, ControlSetting>,
    tentative: BTreeMap<ValueName, ControlSetting>,
    alarms: AlarmManager,
    errors: VecDeque<ErrorRecord>,
    error_capacity: usize,
}

impl Shared {
    fn record_error(&mut self, error: &Error, at: Timestamp) {
        if self.errors.len() >= self.error_capacity {
            self.errors.pop_front();
        }
        self.errors.push_back(ErrorRecord::from_error(error, at));
    }
}

// ---------------------------------------------------------------------------
// Loop worker (owned by the loop thread while running)
// ---------------------------------------------------------------------------

struct Worker<H> {
    hw: H,
    hub: SensorHub,
    params: BreathParameters,
    ctx: FsmContext,
    clock: Arc<dyn Clock>,
    sink: Box<dyn EventSink>,
    tick: Duration,
    loop_counter: u64,
    last_timestamp: Timestamp,
    write_failing: bool,
}

impl<H: ControlHardware> Worker<H> {
    fn run(mut self, shared: &Mutex<Shared>, running: &AtomicBool) -> Self {
        let mut fsm = Fsm::new(build_phase_table(), PhaseId::Ramp);
        self.ctx.now_us = self.clock.now_us();
        self.ctx.pending = self.params;
        self.sink.emit(&LoopEvent::Started);
        fsm.start(&mut self.ctx);
        self.flush_events(Vec::new());

        while running.load(Ordering::Acquire) {
            self.tick(&mut fsm, shared);
            self.clock.sleep(self.tick);
        }

        // Final zeroing write; nothing touches the valves after this.
        if let Err(e) = self.hw.shutdown() {
            error!("shutdown write failed: {e}");
            shared.lock().record_error(&e, self.stamp());
        }
        self.sink.emit(&LoopEvent::Stopped {
            loop_counter: self.loop_counter,
        });
        self
    }

    fn tick(&mut self, fsm: &mut Fsm, shared: &Mutex<Shared>) {
        self.sync_settings(shared);

        let now_us = self.clock.now_us();
        let raw = self.hub.sample(&mut self.hw, now_us);

        self.ctx.now_us = now_us;
        self.ctx.sensors = raw.clone();
        fsm.tick(&mut self.ctx);

        let write = self.hw.set_flow_setpoint(self.ctx.command_pct);

        self.publish(shared, &raw, now_us, write.err());
    }

    /// Promote changed tentative settings into the controller and the
    /// authoritative map.
    fn sync_settings(&mut self, shared: &Mutex<Shared>) {
        let now = self.stamp();
        let proposed: Vec<ControlSetting> = {
            let mut s = shared.lock();
            for name in RECOGNIZED {
                if !s.control_settings.contains_key(&name) {
                    if let Some(current) = self.params.get(name, now) {
                        s.control_settings.insert(name, current);
                    }
                }
            }
            let mut proposed = Vec::new();
            for name in RECOGNIZED {
                let Some(t) = s.tentative.remove(&name) else {
                    continue;
                };
                if s.control_settings.get(&name).is_none_or(|a| t.differs_from(a)) {
                    proposed.push(t);
                }
            }
            proposed
        };

        if proposed.is_empty() {
            return;
        }

        let mut adopted = Vec::with_capacity(proposed.len());
        for t in proposed {
            match self.params.apply(&t) {
                Ok(()) => {
                    if let Some(current) = self.params.get(t.name, now) {
                        info!("setting {} = {}", t.name, current.value);
                        self.sink.emit(&LoopEvent::SettingApplied {
                            name: t.name,
                            value: current.value,
                        });
                        adopted.push(current);
                    }
                }
                Err(e) => {
                    warn!("setting {} = {} rejected: {e}", t.name, t.value);
                    self.sink.emit(&LoopEvent::SettingRejected {
                        name: t.name,
                        value: t.value,
                    });
                }
            }
        }

        self.ctx.pending = self.params;
        if !adopted.is_empty() {
            let mut s = shared.lock();
            for a in adopted {
                s.control_settings.insert(a.name, a);
            }
        }
    }

    fn publish(
        &mut self,
        shared: &Mutex<Shared>,
        raw: &RawSnapshot,
        now_us: u64,
        write_error: Option<Error>,
    ) {
        self.loop_counter += 1;
        self.last_timestamp = self.last_timestamp.max(Timestamp::from_micros(now_us));
        let ts = self.last_timestamp;

        let breath = self.ctx.tracker.last().unwrap_or_default();
        let snapshot = SensorValues {
            pip: breath.pip,
            peep: breath.peep,
            fio2: raw.fio2,
            temp: raw.temp,
            humidity: raw.humidity,
            pressure: raw.pressure,
            vte: breath.vte,
            breaths_per_minute: breath.breaths_per_minute,
            inspiration_time_sec: breath.inspiration_time_sec,
            flow: raw.flow,
            timestamp: ts,
            loop_counter: self.loop_counter,
        };

        let inputs = AlarmInputs {
            pressure: raw.pressure,
            pip_setting: self.ctx.breath.pip.value,
            faulted: &raw.faulted,
            target_missed: self.ctx.target_missed,
        };

        let new_write_failure = match &write_error {
            Some(e) if !self.write_failing => {
                error!("valve write failed: {e}");
                true
            }
            Some(_) => false,
            None => {
                if self.write_failing {
                    info!("valve writes recovered");
                }
                false
            }
        };
        self.write_failing = write_error.is_some();

        let alarm_events = {
            let mut s = shared.lock();
            s.sensor_values = snapshot;
            for name in &raw.new_faults {
                s.record_error(&Error::SensorFault(*name), ts);
            }
            if let (true, Some(e)) = (new_write_failure, &write_error) {
                s.record_error(e, ts);
            }
            s.alarms.evaluate(&inputs, ts)
        };

        let mut events = core::mem::take(&mut self.ctx.events);
        events.extend(raw.new_faults.iter().map(|n| LoopEvent::SensorFault(*n)));
        events.extend(alarm_events);
        self.flush_events(events);
    }

    fn flush_events(&mut self, mut events: Vec<LoopEvent>) {
        events.append(&mut self.ctx.events);
        for e in &events {
            self.sink.emit(e);
        }
    }

    fn stamp(&self) -> Timestamp {
        Timestamp::from_micros(self.clock.now_us()).max(self.last_timestamp)
    }
}

// ---------------------------------------------------------------------------
// ControlModule
// ---------------------------------------------------------------------------

/// The breath controller plus the thread that runs it.
pub struct ControlModule<H> {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    idle: Mutex<Option<Worker<H>>>,
    thread: Mutex<Option<JoinHandle<Worker<H>>>>,
}

impl<H: ControlHardware> ControlModule<H> {
    pub fn new(
        hw: H,
        config: VentConfig,
        clock: Arc<dyn Clock>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Shared {
            sensor_values: SensorValues::default(),
            control_settings: BTreeMap::new(),
            tentative: BTreeMap::new(),
            alarms: AlarmManager::new(config.alarm_log_capacity, config.pressure_alarm_margin),
            errors: VecDeque::new(),
            error_capacity: config.alarm_log_capacity,
        };
        let worker = Worker {
            hw,
            hub: SensorHub::new(&config),
            params: BreathParameters::from_config(&config),
            tick: Duration::from_millis(config.tick_interval_ms),
            ctx: FsmContext::new(config),
            clock,
            sink,
            loop_counter: 0,
            last_timestamp: Timestamp::default(),
            write_failing: false,
        };

        Ok(Self {
            shared: Arc::new(Mutex::new(shared)),
            running: Arc::new(AtomicBool::new(false)),
            idle: Mutex::new(Some(worker)),
            thread: Mutex::new(None),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Start the loop thread.  Starting a running module is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        let worker = self
            .idle
            .lock()
            .take()
            .ok_or_else(|| Error::config("control loop worker unavailable"))?;

        self.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("vent-loop".into())
            .spawn(move || worker.run(&shared, &running))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                Error::config(format!("cannot spawn control loop: {e}"))
            })?;
        *thread = Some(handle);
        info!("control loop started");
        Ok(())
    }

    /// Signal the loop to stop and wait for it.  The loop exits within one
    /// tick, after its final valve-closing write.
    pub fn stop(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        self.running.store(false, Ordering::Release);
        let Some(handle) = thread.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(worker) => {
                *self.idle.lock() = Some(worker);
                info!("control loop stopped");
                Ok(())
            }
            Err(_) => {
                error!("control loop thread panicked");
                Err(Error::config("control loop thread panicked"))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self
                .thread
                .lock()
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Zero-offset calibration of one sensor channel.  Only while stopped.
    pub fn calibrate(&self, name: ValueName, samples: usize) -> Result<f32> {
        let mut idle = self.idle.lock();
        let worker = idle
            .as_mut()
            .ok_or_else(|| Error::config("cannot calibrate while the loop is running"))?;
        worker.hub.calibrate(&mut worker.hw, name, samples)
    }

    // ── Snapshots ─────────────────────────────────────────────────

    pub fn get_sensors(&self) -> SensorValues {
        self.shared.lock().sensor_values
    }

    pub fn get_active_alarms(&self) -> BTreeMap<String, Alarm> {
        self.shared.lock().alarms.active()
    }

    pub fn get_logged_alarms(&self) -> Vec<Alarm> {
        self.shared.lock().alarms.logged()
    }

    pub fn clear_logged_alarms(&self) {
        self.shared.lock().alarms.clear_log();
    }

    /// Faults recorded by the loop, oldest first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.shared.lock().errors.iter().cloned().collect()
    }

    // ── Settings ──────────────────────────────────────────────────

    /// Propose a setting.  Takes effect when the loop promotes it on a
    /// later tick; never blocks on the loop.  Every check runs here, so a
    /// proposal that returns `Ok` is always adopted.
    pub fn set_control(&self, setting: ControlSetting) -> Result<()> {
        let Some((min, max)) = BreathParameters::range(setting.name) else {
            return Err(Error::NotFound(setting.name));
        };
        if !setting.is_admissible() {
            return Err(Error::range(
                setting.name.to_string(),
                setting.value,
                setting.min_value,
                setting.max_value,
            ));
        }

        if !(min <= setting.value && setting.value <= max) {
            return Err(Error::range(setting.name.to_string(), setting.value, min, max));
        }

        let mut s = self.shared.lock();
        if let Some(a) = s.control_settings.get(&setting.name) {
            if !(a.min_value <= setting.value && setting.value <= a.max_value) {
                return Err(Error::range(
                    setting.name.to_string(),
                    setting.value,
                    a.min_value,
                    a.max_value,
                ));
            }
        }
        s.tentative.insert(setting.name, setting);
        Ok(())
    }

    /// Authoritative setting for `name`.
    pub fn get_control(&self, name: ValueName) -> Result<ControlSetting> {
        self.shared
            .lock()
            .control_settings
            .get(&name)
            .copied()
            .ok_or(Error::NotFound(name))
    }
}

impl<H> Drop for ControlModule<H> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.get_mut().take() {
            if handle.join().is_err() {
                error!("control loop thread panicked during shutdown");
            }
        }
    }
}
