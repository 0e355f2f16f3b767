//! Same-process coordinator: direct calls into a [`ControlModule`].

use std::collections::BTreeMap;

use super::Coordinator;
use crate::control::module::{ControlHardware, ControlModule};
use crate::error::Result;
use crate::message::{Alarm, ControlSetting, SensorValues, ValueName};

pub struct CoordinatorLocal<H> {
    module: ControlModule<H>,
}

impl<H: ControlHardware> CoordinatorLocal<H> {
    pub fn new(module: ControlModule<H>) -> Self {
        Self { module }
    }

    /// The underlying module, for operations outside the coordinator
    /// contract (calibration, error log).
    pub fn module(&self) -> &ControlModule<H> {
        &self.module
    }
}

impl<H: ControlHardware> Coordinator for CoordinatorLocal<H> {
    fn get_sensors(&self) -> Result<SensorValues> {
        Ok(self.module.get_sensors())
    }

    fn get_active_alarms(&self) -> Result<BTreeMap<String, Alarm>> {
        Ok(self.module.get_active_alarms())
    }

    fn get_logged_alarms(&self) -> Result<Vec<Alarm>> {
        Ok(self.module.get_logged_alarms())
    }

    fn clear_logged_alarms(&self) -> Result<()> {
        self.module.clear_logged_alarms();
        Ok(())
    }

    fn set_control(&self, setting: ControlSetting) -> Result<()> {
        self.module.set_control(setting)
    }

    fn get_control(&self, name: ValueName) -> Result<ControlSetting> {
        self.module.get_control(name)
    }

    fn start(&self) -> Result<()> {
        self.module.start()
    }

    fn stop(&self) -> Result<()> {
        self.module.stop()
    }

    fn is_running(&self) -> Result<bool> {
        Ok(self.module.is_running())
    }
}
