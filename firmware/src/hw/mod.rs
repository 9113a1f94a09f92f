//! Board-level drivers for the lifter controller.

#[cfg(target_os = "none")]
pub mod outputs;
pub mod vl6180x;
