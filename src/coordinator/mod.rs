//! The coordinator capability set.
//!
//! ```text
//!              ┌──────────────────────┐
//!   caller ──▶ │ dyn Coordinator      │
//!              └─────────┬────────────┘
//!            ┌───────────┴────────────┐
//!            ▼                        ▼
//!   CoordinatorLocal           CoordinatorRemote
//!   (ControlModule in-proc)    (RpcClient ─▶ ventd)
//! ```
//!
//! Callers hold `Arc<dyn Coordinator>` and never learn which variant they
//! got.  Every method is `&self` and safe to call from any thread.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::message::{Alarm, ControlSetting, SensorValue, SensorValues, ValueName};

pub mod local;
pub mod remote;

pub use local::CoordinatorLocal;
pub use remote::CoordinatorRemote;

pub trait Coordinator: Send + Sync {
    /// Latest snapshot published by the loop.
    fn get_sensors(&self) -> Result<SensorValues>;

    /// One reading from the latest snapshot.  Setting-only names such as
    /// `PIP_TIME` give `NotFound`.
    fn get_sensor(&self, name: ValueName) -> Result<SensorValue> {
        self.get_sensors()?
            .reading(name)
            .ok_or(Error::NotFound(name))
    }

    /// Currently active alarms keyed by name.
    fn get_active_alarms(&self) -> Result<BTreeMap<String, Alarm>>;

    /// Alarm history, oldest first.
    fn get_logged_alarms(&self) -> Result<Vec<Alarm>>;

    fn clear_logged_alarms(&self) -> Result<()>;

    /// Propose a setting; the loop applies it at a later tick boundary.
    fn set_control(&self, setting: ControlSetting) -> Result<()>;

    /// Authoritative value of a setting.
    fn get_control(&self, name: ValueName) -> Result<ControlSetting>;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn is_running(&self) -> Result<bool>;
}
