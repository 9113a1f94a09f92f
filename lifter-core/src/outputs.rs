//! Abstraction over the two actuator drive lines.

/// Board-level identifier for a digital output.
pub type PinId = u8;

/// Logic level written to an output line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Returns `true` for [`Level::High`].
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Digital outputs wired to the actuator's extend and retract inputs.
pub trait ActuatorOutputs {
    /// Configures `pin` as a push-pull output.
    fn configure_output(&mut self, pin: PinId);

    /// Drives `pin` to `level`.
    fn write_output(&mut self, pin: PinId, level: Level);
}
