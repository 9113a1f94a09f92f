//! Contract between the position controller and the distance sensor driver.
//!
//! The controller never touches sensor registers. It only relies on the
//! read/timeout/reset behaviour described by [`RangeSensor`], which lets the
//! firmware plug in a real VL6180X while host tests and the emulator use
//! simulated sensors.

use core::fmt;
use core::time::Duration;

/// Scaling factor applied after the default configuration. Only scaling 3
/// covers the 30+ cm travel of the trainer platform.
pub const DEFAULT_SCALING: u8 = 3;
/// Read timeout budget handed to the driver.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Measurement period used in continuous ranging mode (10 Hz).
pub const DEFAULT_CONTINUOUS_PERIOD: Duration = Duration::from_millis(100);

/// Failure reported by a range read or sensor bring-up step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorError {
    /// The measurement did not complete within the configured timeout.
    Timeout,
    /// The bus transaction with the sensor failed.
    Bus,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Timeout => f.write_str("range timeout"),
            SensorError::Bus => f.write_str("sensor bus error"),
        }
    }
}

/// Ranging strategy requested from the driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RangeMode {
    /// One measurement is triggered per read.
    SingleShot,
    /// The sensor ranges on its own at `period`; reads collect the latest result.
    Continuous { period: Duration },
}

/// Driver settings applied on every (re)initialisation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SensorConfig {
    pub scaling: u8,
    pub mode: RangeMode,
    pub timeout: Duration,
}

impl SensorConfig {
    /// Single-shot ranging with the fault-tolerant defaults.
    pub const DEFAULT: Self = Self {
        scaling: DEFAULT_SCALING,
        mode: RangeMode::SingleShot,
        timeout: DEFAULT_READ_TIMEOUT,
    };

    /// Switches to continuous ranging at `period`.
    #[must_use]
    pub const fn continuous(mut self, period: Duration) -> Self {
        self.mode = RangeMode::Continuous { period };
        self
    }

    /// Overrides the read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Distance sensor driver as seen by the position controller.
pub trait RangeSensor {
    /// Performs the hardware bring-up sequence.
    ///
    /// # Errors
    /// Returns [`SensorError::Bus`] when the device does not respond.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Applies scaling and ranging mode.
    ///
    /// # Errors
    /// Returns [`SensorError::Bus`] when a configuration write fails.
    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError>;

    /// Sets the budget after which a read is reported as timed out.
    fn set_timeout(&mut self, timeout: Duration);

    /// Reads one distance sample in millimetres.
    ///
    /// # Errors
    /// Returns [`SensorError::Timeout`] when the measurement did not complete
    /// in time, or [`SensorError::Bus`] on a transfer failure.
    fn read_range(&mut self) -> Result<u16, SensorError>;

    /// Reports whether the last measurement timed out and nothing has cleared
    /// the fault since. A successful read or a [`reset`](Self::reset) clears it.
    fn timeout_occurred(&self) -> bool;

    /// Clears the fault state in hardware.
    ///
    /// # Errors
    /// Returns an error when the sensor cannot be brought out of the fault state.
    fn reset(&mut self) -> Result<(), SensorError>;
}
