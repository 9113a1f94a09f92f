//! Bang-bang position controller for the trainer platform actuator.
//!
//! The controller owns the range sensor, the two actuator drive lines and a
//! [`SmoothingFilter`]. Callers poll it from their own loop: read the
//! position, classify it against the target, then command motion. There is
//! no internal timing; the no-repeat rules on [`move_up`](PositionController::move_up),
//! [`move_down`](PositionController::move_down) and [`brake`](PositionController::brake)
//! make any polling cadence safe.
//!
//! Distances grow as the platform goes down, so "up" means the sensor reading
//! decreases. The upward move is clamped against `min_position` and the
//! downward move against `max_position`.

use core::fmt;

use crate::config::{ConfigError, LifterConfig, Millimeters};
use crate::filter::SmoothingFilter;
use crate::outputs::{ActuatorOutputs, Level};
use crate::sensor::{RangeSensor, SensorError};
use crate::telemetry::{EventSink, LifterEvent, Travel};


pub use self_test::SelfTestFailure;

/// Samples averaged by the position filter (about one second at 10 Hz).
pub const RANGE_FILTER_LEN: usize = 10;

/// Commanded state of the drive lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MotionState {
    /// Both lines low.
    Braked,
    /// Extend high, retract low.
    MovingUp,
    /// Retract high, extend low.
    MovingDown,
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionState::Braked => f.write_str("braked"),
            MotionState::MovingUp => f.write_str("moving-up"),
            MotionState::MovingDown => f.write_str("moving-down"),
        }
    }
}

/// Where the platform sits relative to its target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OffsetDirection {
    /// Within the dead zone, boundaries included.
    OnTarget,
    /// Too low: the actuator has to extend.
    Below,
    /// Too high: the actuator has to retract.
    Above,
    /// The last read failed; no direction can be trusted.
    SensorFault,
}

impl OffsetDirection {
    /// Classifies `offset = target - current` against the dead zone.
    ///
    /// Positions are sensor distances that grow as the platform drops, so a
    /// negative offset means the platform sits too low and must move up.
    #[must_use]
    pub const fn from_offset(offset: Millimeters, bandwidth: Millimeters) -> Self {
        if offset < -bandwidth {
            OffsetDirection::Below
        } else if offset > bandwidth {
            OffsetDirection::Above
        } else {
            OffsetDirection::OnTarget
        }
    }
}

impl fmt::Display for OffsetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetDirection::OnTarget => f.write_str("on-target"),
            OffsetDirection::Below => f.write_str("below"),
            OffsetDirection::Above => f.write_str("above"),
            OffsetDirection::SensorFault => f.write_str("sensor-fault"),
        }
    }
}

/// Snapshot handed to the external control/telemetry caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LifterStatus {
    pub current_position: Millimeters,
    pub target_position: Millimeters,
    pub motion: MotionState,
    pub sensor_fault: bool,
    pub min_position: Millimeters,
    pub max_position: Millimeters,
}

impl fmt::Display for LifterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "position={}mm target={}mm motion={} sensor={} limits={}..{}mm",
            self.current_position,
            self.target_position,
            self.motion,
            if self.sensor_fault { "fault" } else { "ok" },
            self.min_position,
            self.max_position,
        )
    }
}

/// Closed-loop lifter controller.
pub struct PositionController<S, O, E> {
    sensor: S,
    outputs: O,
    events: E,
    filter: SmoothingFilter<RANGE_FILTER_LEN>,
    config: LifterConfig,
    target_position: Millimeters,
    current_position: Millimeters,
    motion: MotionState,
    sensor_fault: bool,
}

impl<S, O, E> PositionController<S, O, E>
where
    S: RangeSensor,
    O: ActuatorOutputs,
    E: EventSink,
{
    /// Configures the drive lines, asserts the brake, brings up the sensor and
    /// primes the filter.
    ///
    /// The brake is written before the configuration is even validated, so
    /// the actuator is held still whatever happens afterwards. A sensor that
    /// fails to come up is not an error here: the controller starts in the
    /// fault state and keeps retrying on every read.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn new(
        sensor: S,
        mut outputs: O,
        events: E,
        config: LifterConfig,
    ) -> Result<Self, ConfigError> {
        outputs.configure_output(config.extend_pin);
        outputs.configure_output(config.retract_pin);
        outputs.write_output(config.extend_pin, Level::Low);
        outputs.write_output(config.retract_pin, Level::Low);

        config.validate()?;

        let mut controller = Self {
            sensor,
            outputs,
            events,
            filter: SmoothingFilter::new(),
            config,
            target_position: config.default_target,
            current_position: config.default_target,
            motion: MotionState::Braked,
            sensor_fault: true,
        };

        if let Err(err) = controller.start_sensor() {
            controller.record(LifterEvent::SensorRecoveryFailed(err));
        }
        controller.prime_filter();

        Ok(controller)
    }

    /// Reads one sample and returns the filtered position.
    ///
    /// A failed read brakes the actuator, reinitialises the sensor and returns
    /// the previous position; the failed sample never enters the filter.
    pub fn read_position(&mut self) -> Millimeters {
        match self.sensor.read_range() {
            Ok(raw) => {
                self.sensor_fault = false;
                let smoothed = self.filter.process(f32::from(raw));
                #[allow(clippy::cast_possible_truncation)]
                let position = smoothed as Millimeters;
                self.current_position = position;
            }
            Err(err) => {
                self.sensor_fault = true;
                self.record(LifterEvent::SensorFault(err));
                self.assert_brake();
                self.recover_sensor();
            }
        }
        self.current_position
    }

    /// Reads the position and classifies it against the target.
    pub fn offset_direction(&mut self) -> OffsetDirection {
        let position = self.read_position();
        if self.sensor_fault || self.sensor.timeout_occurred() {
            return OffsetDirection::SensorFault;
        }
        OffsetDirection::from_offset(self.target_position - position, self.config.bandwidth)
    }

    /// Sets the target, clamped into the mechanical limits. Returns the accepted value.
    pub fn set_target_position(&mut self, position: Millimeters) -> Millimeters {
        let accepted = self.config.clamp(position);
        if accepted != self.target_position {
            self.target_position = accepted;
            self.events.record(LifterEvent::TargetChanged, accepted);
        }
        accepted
    }

    /// Drives the actuator up (extend), unless that would pass `min_position`.
    pub fn move_up(&mut self) {
        self.drive(Travel::Up);
    }

    /// Drives the actuator down (retract), unless that would pass `max_position`.
    pub fn move_down(&mut self) {
        self.drive(Travel::Down);
    }

    /// Stops the actuator and re-synchronises the filter with fresh reads.
    pub fn brake(&mut self) {
        if self.motion == MotionState::Braked {
            return;
        }
        self.assert_brake();
        self.prime_filter();
    }

    /// Runs one iteration of the control loop and returns the decision it acted on.
    pub fn regulate(&mut self) -> OffsetDirection {
        let direction = self.offset_direction();
        match direction {
            OffsetDirection::OnTarget | OffsetDirection::SensorFault => self.brake(),
            OffsetDirection::Below => self.move_up(),
            OffsetDirection::Above => self.move_down(),
        }
        direction
    }

    fn drive(&mut self, travel: Travel) {
        let (wanted, opposite) = match travel {
            Travel::Up => (MotionState::MovingUp, MotionState::MovingDown),
            Travel::Down => (MotionState::MovingDown, MotionState::MovingUp),
        };

        // Reversals always pass through the brake.
        if self.motion == opposite {
            self.brake();
        }

        if self.sensor_fault {
            self.record(LifterEvent::MotionRefused(travel));
            self.brake();
            return;
        }
        if self.at_limit(travel) {
            self.record(LifterEvent::LimitClamp(travel));
            self.brake();
            return;
        }
        if self.motion == wanted {
            return;
        }

        let (low, high) = match travel {
            Travel::Up => (self.config.retract_pin, self.config.extend_pin),
            Travel::Down => (self.config.extend_pin, self.config.retract_pin),
        };
        self.outputs.write_output(low, Level::Low);
        self.outputs.write_output(high, Level::High);
        self.motion = wanted;
        self.record(LifterEvent::MotionStarted(travel));
    }

    fn at_limit(&self, travel: Travel) -> bool {
        match travel {
            Travel::Up => {
                self.current_position <= self.config.min_position + self.config.bandwidth
            }
            Travel::Down => {
                self.current_position >= self.config.max_position - self.config.bandwidth
            }
        }
    }

    /// Writes both lines low without touching the filter.
    fn assert_brake(&mut self) {
        if self.motion == MotionState::Braked {
            return;
        }
        self.outputs.write_output(self.config.extend_pin, Level::Low);
        self.outputs.write_output(self.config.retract_pin, Level::Low);
        self.motion = MotionState::Braked;
        self.record(LifterEvent::BrakeAsserted);
    }

    fn prime_filter(&mut self) {
        for _ in 0..RANGE_FILTER_LEN {
            self.read_position();
        }
        self.record(LifterEvent::FilterPrimed);
    }

    fn start_sensor(&mut self) -> Result<(), SensorError> {
        let sensor_config = self.config.sensor;
        self.sensor.init()?;
        self.sensor.configure(&sensor_config)?;
        self.sensor.set_timeout(sensor_config.timeout);
        Ok(())
    }

    fn recover_sensor(&mut self) {
        let outcome = self.sensor.reset().and_then(|()| self.start_sensor());
        match outcome {
            Ok(()) => self.record(LifterEvent::SensorRecovered),
            Err(err) => self.record(LifterEvent::SensorRecoveryFailed(err)),
        }
    }

    fn record(&mut self, event: LifterEvent) {
        self.events.record(event, self.current_position);
    }
}

impl<S, O, E> PositionController<S, O, E> {
    /// Last filtered position.
    #[must_use]
    pub const fn current_position(&self) -> Millimeters {
        self.current_position
    }

    #[must_use]
    pub const fn target_position(&self) -> Millimeters {
        self.target_position
    }

    #[must_use]
    pub const fn motion_state(&self) -> MotionState {
        self.motion
    }

    /// Returns `true` while the most recent read failed.
    #[must_use]
    pub const fn sensor_fault(&self) -> bool {
        self.sensor_fault
    }

    #[must_use]
    pub const fn config(&self) -> &LifterConfig {
        &self.config
    }

    #[must_use]
    pub const fn status(&self) -> LifterStatus {
        LifterStatus {
            current_position: self.current_position,
            target_position: self.target_position,
            motion: self.motion,
            sensor_fault: self.sensor_fault,
            min_position: self.config.min_position,
            max_position: self.config.max_position,
        }
    }

    #[must_use]
    pub const fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    #[must_use]
    pub const fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    #[must_use]
    pub const fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Releases the collaborators. The drive lines are left as last commanded.
    #[must_use]
    pub fn into_parts(self) -> (S, O, E) {
        (self.sensor, self.outputs, self.events)
    }
}
