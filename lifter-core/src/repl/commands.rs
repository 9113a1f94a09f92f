//! Executes parsed console commands against a [`PositionController`].

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use super::grammar::{GrammarError, HELP_TOPICS, LifterCommand, parse_command};
use crate::config::Millimeters;
use crate::controller::{
    LifterStatus, MotionState, OffsetDirection, PositionController, SelfTestFailure,
};
use crate::outputs::ActuatorOutputs;
use crate::sensor::RangeSensor;
use crate::telemetry::EventSink;

/// Pause between iterations of `regulate <n>` (10 Hz, the sensor sample rate).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a successfully executed command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Target {
        requested: u16,
        accepted: Millimeters,
    },
    Motion(MotionState),
    Position(Millimeters),
    Offset(OffsetDirection),
    Regulated {
        iterations: u16,
        last: OffsetDirection,
        position: Millimeters,
    },
    Status(LifterStatus),
    SelfTest(Result<(), SelfTestFailure>),
    /// The requested topic's help line, or `None` for the command list.
    Help(Option<&'static str>),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Target {
                requested,
                accepted,
            } => {
                if Millimeters::from(*requested) == *accepted {
                    write!(f, "OK target={accepted}mm")
                } else {
                    write!(f, "OK target={accepted}mm (clamped from {requested}mm)")
                }
            }
            CommandOutcome::Motion(state) => write!(f, "OK {state}"),
            CommandOutcome::Position(position) => write!(f, "OK position={position}mm"),
            CommandOutcome::Offset(direction) => write!(f, "OK offset={direction}"),
            CommandOutcome::Regulated {
                iterations,
                last,
                position,
            } => write!(
                f,
                "OK regulated iterations={iterations} last={last} position={position}mm"
            ),
            CommandOutcome::Status(status) => write!(f, "OK {status}"),
            CommandOutcome::SelfTest(Ok(())) => f.write_str("OK self-test passed"),
            CommandOutcome::SelfTest(Err(failure)) => {
                write!(f, "FAIL self-test: {failure}")
            }
            CommandOutcome::Help(Some(detail)) => write!(f, "OK {detail}"),
            CommandOutcome::Help(None) => {
                f.write_str("OK commands:")?;
                for (name, _) in HELP_TOPICS {
                    write!(f, " {name}")?;
                }
                Ok(())
            }
        }
    }
}

/// Errors surfaced by [`CommandExecutor::execute`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandError {
    Parse(GrammarError),
}

impl From<GrammarError> for CommandError {
    fn from(err: GrammarError) -> Self {
        CommandError::Parse(err)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => write!(f, "ERR syntax {err}"),
        }
    }
}

/// Owns a controller and applies console commands to it.
pub struct CommandExecutor<S, O, E> {
    controller: PositionController<S, O, E>,
    poll_interval: Duration,
}

impl<S, O, E> CommandExecutor<S, O, E>
where
    S: RangeSensor,
    O: ActuatorOutputs,
    E: EventSink,
{
    /// Wraps `controller` with the default poll interval.
    #[must_use]
    pub fn new(controller: PositionController<S, O, E>) -> Self {
        Self {
            controller,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the pause between `regulate` iterations.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn controller(&self) -> &PositionController<S, O, E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PositionController<S, O, E> {
        &mut self.controller
    }

    /// Parses and runs `line`. `delay` paces `regulate` and `selftest`.
    ///
    /// # Errors
    /// Returns [`CommandError::Parse`] when the line is not a valid command.
    pub fn execute<D: DelayNs>(
        &mut self,
        line: &str,
        delay: &mut D,
    ) -> Result<CommandOutcome, CommandError> {
        let command = parse_command(line)?;
        Ok(self.apply(command, delay))
    }

    /// Runs an already parsed command.
    pub fn apply<D: DelayNs>(&mut self, command: LifterCommand, delay: &mut D) -> CommandOutcome {
        let controller = &mut self.controller;
        match command {
            LifterCommand::Target(requested) => {
                let accepted = controller.set_target_position(Millimeters::from(requested));
                CommandOutcome::Target {
                    requested,
                    accepted,
                }
            }
            LifterCommand::Up => {
                controller.move_up();
                CommandOutcome::Motion(controller.motion_state())
            }
            LifterCommand::Down => {
                controller.move_down();
                CommandOutcome::Motion(controller.motion_state())
            }
            LifterCommand::Brake => {
                controller.brake();
                CommandOutcome::Motion(controller.motion_state())
            }
            LifterCommand::Read => CommandOutcome::Position(controller.read_position()),
            LifterCommand::Offset => CommandOutcome::Offset(controller.offset_direction()),
            LifterCommand::Regulate(iterations) => {
                let interval_ms = u32::try_from(self.poll_interval.as_millis()).unwrap_or(u32::MAX);
                let mut last = OffsetDirection::OnTarget;
                for _ in 0..iterations {
                    last = controller.regulate();
                    delay.delay_ms(interval_ms);
                }
                CommandOutcome::Regulated {
                    iterations,
                    last,
                    position: controller.current_position(),
                }
            }
            LifterCommand::Status => CommandOutcome::Status(controller.status()),
            LifterCommand::SelfTest => {
                CommandOutcome::SelfTest(controller.test_basic_motion(delay))
            }
            LifterCommand::Help(topic) => CommandOutcome::Help(topic),
        }
    }

    /// Consumes the executor and returns the controller.
    #[must_use]
    pub fn into_controller(self) -> PositionController<S, O, E> {
        self.controller
    }
}
