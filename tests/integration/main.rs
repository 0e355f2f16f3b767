//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock hardware and a simulated clock.  All tests run on the host
//! with no real valves or sensors required.

mod control_loop_tests;
mod coordinator_tests;
mod mock_hw;
mod rpc_tests;
