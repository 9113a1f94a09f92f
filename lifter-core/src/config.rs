//! Power-on configuration for the lifter.
//!
//! Everything the controller needs at construction time lives in
//! [`LifterConfig`]. The values are plain data so firmware can build them in a
//! `const` and the emulator can tweak them per session.

use core::fmt;
use core::time::Duration;

use crate::outputs::PinId;
use crate::sensor::SensorConfig;

/// Distance unit used for every position, limit, and bandwidth.
pub type Millimeters = i32;

/// Largest distance the range sensor can report.
pub const MAX_SENSOR_DISTANCE: Millimeters = 65_535;

/// Target used until the caller sets one (flat road).
pub const DEFAULT_TARGET_POSITION: Millimeters = 400;
/// How long the self-test drives the actuator up.
pub const DEFAULT_SELF_TEST_UP: Duration = Duration::from_millis(800);
/// How long the self-test drives the actuator down; longer to undo the up move.
pub const DEFAULT_SELF_TEST_DOWN: Duration = Duration::from_millis(1_600);

/// Motion durations used by the commissioning self-test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SelfTestConfig {
    pub up_duration: Duration,
    pub down_duration: Duration,
}

impl SelfTestConfig {
    pub const DEFAULT: Self = Self {
        up_duration: DEFAULT_SELF_TEST_UP,
        down_duration: DEFAULT_SELF_TEST_DOWN,
    };

    /// Builds a self-test timing pair.
    #[must_use]
    pub const fn new(up_duration: Duration, down_duration: Duration) -> Self {
        Self {
            up_duration,
            down_duration,
        }
    }
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pin assignment, mechanical limits, and tuning for one lifter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LifterConfig {
    /// Output that makes the actuator extend (platform moves up).
    pub extend_pin: PinId,
    /// Output that makes the actuator retract (platform moves down).
    pub retract_pin: PinId,
    pub min_position: Millimeters,
    pub max_position: Millimeters,
    /// Half-width of the dead zone around the target.
    pub bandwidth: Millimeters,
    pub default_target: Millimeters,
    pub sensor: SensorConfig,
    pub self_test: SelfTestConfig,
}

impl LifterConfig {
    /// Creates a configuration with default target, sensor, and self-test settings.
    #[must_use]
    pub const fn new(
        extend_pin: PinId,
        retract_pin: PinId,
        min_position: Millimeters,
        max_position: Millimeters,
        bandwidth: Millimeters,
    ) -> Self {
        Self {
            extend_pin,
            retract_pin,
            min_position,
            max_position,
            bandwidth,
            default_target: DEFAULT_TARGET_POSITION,
            sensor: SensorConfig::DEFAULT,
            self_test: SelfTestConfig::DEFAULT,
        }
    }

    #[must_use]
    pub const fn with_default_target(mut self, target: Millimeters) -> Self {
        self.default_target = target;
        self
    }

    #[must_use]
    pub const fn with_sensor(mut self, sensor: SensorConfig) -> Self {
        self.sensor = sensor;
        self
    }

    #[must_use]
    pub const fn with_self_test(mut self, self_test: SelfTestConfig) -> Self {
        self.self_test = self_test;
        self
    }

    /// Checks that the limits describe a usable travel.
    ///
    /// Limits must lie within what the sensor can report, which keeps every
    /// offset and limit comparison the controller makes inside `Millimeters`.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extend_pin == self.retract_pin {
            return Err(ConfigError::SharedPin(self.extend_pin));
        }
        if !(1..=3).contains(&self.sensor.scaling) {
            return Err(ConfigError::InvalidScaling(self.sensor.scaling));
        }
        if self.min_position < 0 || self.max_position > MAX_SENSOR_DISTANCE {
            return Err(ConfigError::LimitsOutOfRange {
                min: self.min_position,
                max: self.max_position,
            });
        }
        if self.min_position >= self.max_position {
            return Err(ConfigError::InvertedLimits {
                min: self.min_position,
                max: self.max_position,
            });
        }
        if self.bandwidth < 0 {
            return Err(ConfigError::NegativeBandwidth(self.bandwidth));
        }
        let travel = self.max_position - self.min_position;
        if self.bandwidth.saturating_mul(2) >= travel {
            return Err(ConfigError::DeadZoneTooWide {
                bandwidth: self.bandwidth,
                travel,
            });
        }
        if !self.contains(self.default_target) {
            return Err(ConfigError::TargetOutOfRange(self.default_target));
        }
        Ok(())
    }

    /// Returns `true` when `position` lies within the mechanical limits.
    #[must_use]
    pub fn contains(&self, position: Millimeters) -> bool {
        (self.min_position..=self.max_position).contains(&position)
    }

    /// Clamps `position` into the mechanical limits.
    #[must_use]
    pub fn clamp(&self, position: Millimeters) -> Millimeters {
        position.clamp(self.min_position, self.max_position)
    }
}

/// Reasons a [`LifterConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    SharedPin(PinId),
    InvalidScaling(u8),
    LimitsOutOfRange {
        min: Millimeters,
        max: Millimeters,
    },
    InvertedLimits {
        min: Millimeters,
        max: Millimeters,
    },
    NegativeBandwidth(Millimeters),
    DeadZoneTooWide {
        bandwidth: Millimeters,
        travel: Millimeters,
    },
    TargetOutOfRange(Millimeters),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SharedPin(pin) => {
                write!(f, "extend and retract both assigned to pin {pin}")
            }
            ConfigError::InvalidScaling(scaling) => {
                write!(f, "sensor scaling {scaling} must be 1, 2 or 3")
            }
            ConfigError::LimitsOutOfRange { min, max } => write!(
                f,
                "limits {min}..{max} must lie within 0..{MAX_SENSOR_DISTANCE}"
            ),
            ConfigError::InvertedLimits { min, max } => {
                write!(f, "min position {min} must be below max position {max}")
            }
            ConfigError::NegativeBandwidth(bandwidth) => {
                write!(f, "bandwidth {bandwidth} must not be negative")
            }
            ConfigError::DeadZoneTooWide { bandwidth, travel } => {
                write!(f, "dead zone of +/-{bandwidth} does not fit a travel of {travel}")
            }
            ConfigError::TargetOutOfRange(target) => {
                write!(f, "default target {target} lies outside the limits")
            }
        }
    }
}
