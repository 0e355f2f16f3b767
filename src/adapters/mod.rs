//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                   |
//! |---------------|---------------------|-------------------------------|
//! | `calibration` | CalibrationSource   | JSON valve calibration file   |
//! | `gpio`        | ActuatorPort        | embedded-hal pins / PWM       |
//! | `hal`         | SensorPort          | sensor device(s)              |
//! |               | FlowControlPort     | inlet + proportional valves   |
//! | `log_sink`    | EventSink           | `log` facade                  |
//! | `sim`         | ActuatorPort        | in-memory line                |
//! | `time`        | Clock               | system clock / simulated time |

pub mod calibration;
pub mod gpio;
pub mod hal;
pub mod log_sink;
pub mod sim;
pub mod time;
