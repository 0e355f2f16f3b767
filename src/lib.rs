//! Ventilator control core.
//!
//! Exposes the control loop, the valve layer and both coordinator
//! variants for the `ventd` daemon, integration tests and supervising
//! processes.
//!
//! ```text
//!   Coordinator (local | remote via rpc)
//!        │
//!   ControlModule ── fsm (ramp ▸ hold ▸ release) ── pid
//!        │
//!   FlowControlPort / SensorPort ── adapters::hal ── drivers::valve
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod alarms;
pub mod app;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod message;
pub mod rpc;
pub mod sensors;

pub use coordinator::{Coordinator, CoordinatorLocal, CoordinatorRemote};
pub use error::{Error, Result};
