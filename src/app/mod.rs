//! Application boundary: the traits and events the control core speaks.
//!
//! All interaction with hardware, time and observers happens through the
//! **port traits** defined in [`ports`], keeping the control loop fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
