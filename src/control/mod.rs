//! Breath control: PID, settings, derived measurements and the loop that
//! ties them to the hardware.

pub mod breath;
pub mod module;
pub mod pid;
pub mod settings;
