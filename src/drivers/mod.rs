//! Valve drivers and the calibrated response curve they share.

pub mod control_valve;
pub mod response;
pub mod valve;
