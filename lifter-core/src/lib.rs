#![no_std]

// Position control for the bicycle trainer lifter.
//
// The crate holds everything that does not depend on a particular MCU: the
// range smoothing filter, the bang-bang position controller with its sensor
// fault recovery, the collaborator traits the firmware implements, and the
// command console shared by firmware and emulator.

pub mod config;
pub mod controller;
pub mod filter;
pub mod outputs;
pub mod repl;
pub mod sensor;
pub mod telemetry;
