//! Line-oriented command console for driving a lifter by hand.

pub mod commands;
pub mod grammar;
