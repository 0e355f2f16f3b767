//! Sensor subsystem: verified channels and the aggregating [`SensorHub`].
//!
//! The hub owns one [`SensorChannel`] per measured quantity and produces a
//! [`RawSnapshot`] each tick that gets written into `FsmContext.sensors`.

pub mod channel;
pub mod sim;

use heapless::Vec as HVec;
use log::{error, info};

use crate::app::ports::SensorPort;
use crate::config::VentConfig;
use crate::error::Result;
use crate::message::ValueName;
use channel::SensorChannel;

/// Quantities read directly from hardware every tick.
pub const MEASURED: [ValueName; 5] = [
    ValueName::Pressure,
    ValueName::Flow,
    ValueName::Fio2,
    ValueName::Temp,
    ValueName::Humidity,
];

/// One tick's worth of verified readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub pressure: f32,
    pub flow: f32,
    pub fio2: f32,
    pub temp: f32,
    pub humidity: f32,
    /// Channels currently past the consecutive-failure threshold.
    pub faulted: HVec<ValueName, 5>,
    /// Channels that crossed the threshold on this tick.
    pub new_faults: HVec<ValueName, 5>,
}

/// Aggregates all sensor channels and produces a unified snapshot.
pub struct SensorHub {
    channels: [SensorChannel; 5],
    latched: [bool; 5],
    fault_threshold: u32,
}

impl SensorHub {
    pub fn new(config: &VentConfig) -> Self {
        Self {
            channels: [
                SensorChannel::new(ValueName::Pressure, config.pressure_range),
                SensorChannel::new(ValueName::Flow, config.flow_range),
                SensorChannel::new(ValueName::Fio2, config.fio2_range),
                SensorChannel::new(ValueName::Temp, config.temp_range),
                SensorChannel::new(ValueName::Humidity, config.humidity_range),
            ],
            latched: [false; 5],
            fault_threshold: config.sensor_fault_threshold,
        }
    }

    pub fn channel(&self, name: ValueName) -> Option<&SensorChannel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    /// Read every channel and return a unified snapshot.
    ///
    /// Individual read failures are absorbed and the previous good value is
    /// retained: a single flaky sensor must not crash the control loop.
    pub fn sample<P: SensorPort + ?Sized>(&mut self, port: &mut P, now_us: u64) -> RawSnapshot {
        let mut snap = RawSnapshot::default();

        for (channel, latched) in self.channels.iter_mut().zip(self.latched.iter_mut()) {
            let name = channel.name();
            channel.update(port.read(name), now_us);

            let faulted = channel.consecutive_failures() >= self.fault_threshold;
            if faulted {
                if !*latched {
                    error!(
                        "SENSOR FAULT: {name} invalid for {} consecutive ticks",
                        channel.consecutive_failures()
                    );
                    let _ = snap.new_faults.push(name);
                }
                let _ = snap.faulted.push(name);
            } else if *latched {
                info!("SENSOR RECOVERED: {name}");
            }
            *latched = faulted;

            let v = channel.get();
            match name {
                ValueName::Pressure => snap.pressure = v,
                ValueName::Flow => snap.flow = v,
                ValueName::Fio2 => snap.fio2 = v,
                ValueName::Temp => snap.temp = v,
                ValueName::Humidity => snap.humidity = v,
                _ => {}
            }
        }

        snap
    }

    /// Zero-offset calibration of one channel.
    pub fn calibrate<P: SensorPort + ?Sized>(
        &mut self,
        port: &mut P,
        name: ValueName,
        samples: usize,
    ) -> Result<f32> {
        let channel = self
            .channels
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or(crate::error::Error::NotFound(name))?;
        let offset = channel.calibrate(port, samples)?;
        info!("{name}: calibrated offset {offset:.4} over {samples} samples");
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;

    /// Port that fails one named channel and returns 1.0 elsewhere.
    struct Flaky {
        broken: Option<ValueName>,
    }

    impl SensorPort for Flaky {
        fn read(&mut self, name: ValueName) -> core::result::Result<f32, SensorError> {
            if Some(name) == self.broken {
                Err(SensorError::ReadFailed)
            } else {
                Ok(1.0)
            }
        }
    }

    #[test]
    fn healthy_port_fills_every_field() {
        let mut hub = SensorHub::new(&VentConfig::default());
        let snap = hub.sample(&mut Flaky { broken: None }, 0);
        assert!((snap.pressure - 1.0).abs() < f32::EPSILON);
        assert!((snap.humidity - 1.0).abs() < f32::EPSILON);
        assert!(snap.faulted.is_empty());
    }

    #[test]
    fn fault_raised_once_at_threshold() {
        let cfg = VentConfig {
            sensor_fault_threshold: 3,
            ..VentConfig::default()
        };
        let mut hub = SensorHub::new(&cfg);
        let mut port = Flaky { broken: None };
        hub.sample(&mut port, 0);

        port.broken = Some(ValueName::Fio2);
        let s1 = hub.sample(&mut port, 1);
        let s2 = hub.sample(&mut port, 2);
        assert!(s1.faulted.is_empty() && s2.faulted.is_empty());
        let s3 = hub.sample(&mut port, 3);
        assert_eq!(s3.new_faults.as_slice(), &[ValueName::Fio2]);
        let s4 = hub.sample(&mut port, 4);
        assert!(s4.new_faults.is_empty());
        assert_eq!(s4.faulted.as_slice(), &[ValueName::Fio2]);
        // Last good value carried through the outage.
        assert!((s4.fio2 - 1.0).abs() < f32::EPSILON);

        port.broken = None;
        let s5 = hub.sample(&mut port, 5);
        assert!(s5.faulted.is_empty());
    }

    #[test]
    fn calibrate_unknown_channel_is_not_found() {
        let mut hub = SensorHub::new(&VentConfig::default());
        let r = hub.calibrate(&mut Flaky { broken: None }, ValueName::Pip, 10);
        assert!(r.is_err());
    }
}
