//! Valve capability traits and simulated valves.
//!
//! Two kinds of valve exist:
//!
//! - [`BinaryValve`]: on/off solenoid.  Its *form* decides whether
//!   energising the coil opens it (normally closed) or shuts it
//!   (normally open).
//! - [`ProportionalValve`]: driven to a setpoint in `[0, 100]` through a
//!   calibrated response curve.
//!
//! The simulated variants hold state in memory and round-trip it exactly.
//! When coupled to a [`PlantHandle`] they also feed the simulated airway.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

pub use super::response::Direction;
use crate::error::{Error, Result};
use crate::sensors::sim::PlantHandle;

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValveForm {
    NormallyClosed,
    NormallyOpen,
}

impl ValveForm {
    /// Actuator level that opens a valve of this form.
    pub const fn open_level(self) -> f32 {
        match self {
            Self::NormallyClosed => 1.0,
            Self::NormallyOpen => 0.0,
        }
    }

    /// Actuator level that closes a valve of this form.
    pub const fn closed_level(self) -> f32 {
        match self {
            Self::NormallyClosed => 0.0,
            Self::NormallyOpen => 1.0,
        }
    }

    /// Whether raw actuator `level` means "open" for this form.
    pub fn is_open_level(self, level: f32) -> bool {
        let energised = level > 0.5;
        match self {
            Self::NormallyClosed => energised,
            Self::NormallyOpen => !energised,
        }
    }
}

impl FromStr for ValveForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Normally Closed" | "NC" => Ok(Self::NormallyClosed),
            "Normally Open" | "NO" => Ok(Self::NormallyOpen),
            other => Err(Error::config(format!("unknown valve form {other:?}"))),
        }
    }
}

impl fmt::Display for ValveForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NormallyClosed => write!(f, "Normally Closed"),
            Self::NormallyOpen => write!(f, "Normally Open"),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

pub trait BinaryValve {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn is_open(&mut self) -> Result<bool>;
}

pub trait ProportionalValve {
    /// Current setpoint in `[0, 100]` read on the `dir` branch.
    fn setpoint_toward(&mut self, dir: Direction) -> Result<f32>;

    /// Drive to `sp` in `[0, 100]` using the `dir` branch.
    fn set_setpoint_toward(&mut self, sp: f32, dir: Direction) -> Result<()>;

    fn setpoint(&mut self) -> Result<f32> {
        self.setpoint_toward(Direction::Rising)
    }

    fn set_setpoint(&mut self, sp: f32) -> Result<()> {
        self.set_setpoint_toward(sp, Direction::Rising)
    }
}

fn check_setpoint(sp: f32) -> Result<()> {
    if (0.0..=100.0).contains(&sp) {
        Ok(())
    } else {
        Err(Error::range("setpoint", sp, 0.0, 100.0))
    }
}

// ---------------------------------------------------------------------------
// Simulated valves
// ---------------------------------------------------------------------------

/// In-memory on/off valve.
#[derive(Debug, Default)]
pub struct SimOnOffValve {
    open: bool,
    plant: Option<PlantHandle>,
}

impl SimOnOffValve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valve whose state feeds the simulated airway inlet.
    pub fn coupled(plant: PlantHandle) -> Self {
        Self {
            open: false,
            plant: Some(plant),
        }
    }
}

impl BinaryValve for SimOnOffValve {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        if let Some(p) = &self.plant {
            p.set_inlet_open(true);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        if let Some(p) = &self.plant {
            p.set_inlet_open(false);
        }
        Ok(())
    }

    fn is_open(&mut self) -> Result<bool> {
        Ok(self.open)
    }
}

/// In-memory proportional valve.  Direction is ignored: what was set is
/// what is read back.
#[derive(Debug, Default)]
pub struct SimControlValve {
    setpoint: f32,
    plant: Option<PlantHandle>,
}

impl SimControlValve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coupled(plant: PlantHandle) -> Self {
        Self {
            setpoint: 0.0,
            plant: Some(plant),
        }
    }
}

impl ProportionalValve for SimControlValve {
    fn setpoint_toward(&mut self, _dir: Direction) -> Result<f32> {
        Ok(self.setpoint)
    }

    fn set_setpoint_toward(&mut self, sp: f32, _dir: Direction) -> Result<()> {
        check_setpoint(sp)?;
        self.setpoint = sp;
        if let Some(p) = &self.plant {
            p.set_valve_setpoint(sp);
        }
        Ok(())
    }
}

impl BinaryValve for SimControlValve {
    fn open(&mut self) -> Result<()> {
        self.set_setpoint(100.0)
    }

    fn close(&mut self) -> Result<()> {
        self.set_setpoint(0.0)
    }

    fn is_open(&mut self) -> Result<bool> {
        Ok(self.setpoint > 0.0)
    }
}

/// Wraps a real valve driver so that the opening it reports back also
/// drives the simulated airway.  Lets the daemon exercise the full
/// actuator path (form inversion, calibration lookup) against the plant.
pub struct PlantLinked<V> {
    inner: V,
    plant: PlantHandle,
}

impl<V> PlantLinked<V> {
    pub fn new(inner: V, plant: PlantHandle) -> Self {
        Self { inner, plant }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }
}

impl<V: BinaryValve> BinaryValve for PlantLinked<V> {
    fn open(&mut self) -> Result<()> {
        self.inner.open()?;
        let open = self.inner.is_open()?;
        self.plant.set_inlet_open(open);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()?;
        let open = self.inner.is_open()?;
        self.plant.set_inlet_open(open);
        Ok(())
    }

    fn is_open(&mut self) -> Result<bool> {
        self.inner.is_open()
    }
}

impl<V: ProportionalValve> ProportionalValve for PlantLinked<V> {
    fn setpoint_toward(&mut self, dir: Direction) -> Result<f32> {
        self.inner.setpoint_toward(dir)
    }

    fn set_setpoint_toward(&mut self, sp: f32, dir: Direction) -> Result<()> {
        self.inner.set_setpoint_toward(sp, dir)?;
        let effective = self.inner.setpoint_toward(dir)?;
        self.plant.set_valve_setpoint(effective);
        Ok(())
    }
}
