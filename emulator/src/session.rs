use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use lifter_core::config::LifterConfig;
use lifter_core::controller::PositionController;
use lifter_core::repl::commands::CommandExecutor;
use lifter_core::repl::grammar::{HELP_TOPICS, help_for};
use lifter_core::telemetry::{EventId, LifterEventLog};

use crate::plant::{SensorFault, SimDelay, SimOutputs, SimPlant, SimSensor};

pub const EXTEND_PIN: u8 = 4;
pub const RETRACT_PIN: u8 = 5;
/// Where the simulated platform rests at power-up.
pub const START_DISTANCE_MM: f32 = 520.0;

/// Commands handled by the emulator itself rather than the controller.
pub const EMULATOR_TOPICS: &[(&str, &str)] = &[
    (
        "fault",
        "fault <n>|stuck|clear - time out the next n reads, jam or heal the sensor",
    ),
    ("plant", "plant           - show the simulated actuator state"),
];

const FAULT_USAGE: &str = "fault expects a count, `stuck` or `clear`";

pub const fn emulator_config() -> LifterConfig {
    LifterConfig::new(EXTEND_PIN, RETRACT_PIN, 100, 700, 10)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Regulate,
    Fault,
    SelfTest,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Regulate => "transcripts/emulator-regulate.log",
            TranscriptProfile::Fault => "transcripts/emulator-fault.log",
            TranscriptProfile::SelfTest => "transcripts/emulator-selftest.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Regulate => "Lifter Emulator regulation transcript",
            TranscriptProfile::Fault => "Lifter Emulator sensor fault transcript",
            TranscriptProfile::SelfTest => "Lifter Emulator self-test transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("regulate") {
            Ok(Self::Regulate)
        } else if tag.eq_ignore_ascii_case("fault") {
            Ok(Self::Fault)
        } else if tag.eq_ignore_ascii_case("selftest") {
            Ok(Self::SelfTest)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

pub struct Session {
    executor: CommandExecutor<SimSensor, SimOutputs, LifterEventLog>,
    plant: SimPlant,
    delay: SimDelay,
    transcript: Option<TranscriptLogger>,
    next_event: EventId,
}

impl Session {
    /// Starts a session that records every exchange to the profile's log.
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let mut session = Self::detached()?;
        session.transcript = Some(transcript);
        Ok(session)
    }

    /// Starts a session without a transcript file.
    pub fn detached() -> io::Result<Self> {
        let plant = SimPlant::new(START_DISTANCE_MM, EXTEND_PIN, RETRACT_PIN);
        let controller = PositionController::new(
            plant.sensor(),
            plant.outputs(),
            LifterEventLog::new(),
            emulator_config(),
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        Ok(Self {
            executor: CommandExecutor::new(controller),
            delay: plant.delay(),
            plant,
            transcript: None,
            next_event: 0,
        })
    }

    #[cfg(test)]
    pub fn plant(&self) -> &SimPlant {
        &self.plant
    }

    #[cfg(test)]
    pub fn executor(&self) -> &CommandExecutor<SimSensor, SimOutputs, LifterEventLog> {
        &self.executor
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.plant.elapsed();
        self.log(elapsed, TranscriptRole::Host, trimmed)?;

        let mut words = trimmed.split_whitespace();
        let head = words.next().unwrap_or_default();
        let mut lines = if head.eq_ignore_ascii_case("help") {
            help_lines(words.next())
        } else if head.eq_ignore_ascii_case("fault") {
            self.handle_fault(words.next())
        } else if head.eq_ignore_ascii_case("plant") {
            vec![self.describe_plant()]
        } else {
            match self.executor.execute(trimmed, &mut self.delay) {
                Ok(outcome) => vec![outcome.to_string()],
                Err(err) => vec![err.to_string()],
            }
        };
        lines.extend(self.drain_events());

        let elapsed = self.plant.elapsed();
        for response in &lines {
            self.log(elapsed, TranscriptRole::Emulator, response)?;
        }
        Ok(lines)
    }

    fn handle_fault(&mut self, argument: Option<&str>) -> Vec<String> {
        let fault = match argument {
            Some(arg) if arg.eq_ignore_ascii_case("stuck") => SensorFault::Stuck,
            Some(arg) if arg.eq_ignore_ascii_case("clear") => SensorFault::None,
            Some(arg) => match arg.parse::<u32>() {
                Ok(0) => SensorFault::None,
                Ok(count) => SensorFault::Transient(count),
                Err(_) => return vec![format!("ERR syntax {FAULT_USAGE}, got `{arg}`")],
            },
            None => return vec![format!("ERR syntax {FAULT_USAGE}")],
        };
        self.plant.inject(fault);
        vec![match fault {
            SensorFault::None => "OK sensor healthy".to_string(),
            SensorFault::Transient(count) => format!("OK next {count} read(s) will time out"),
            SensorFault::Stuck => "OK sensor jammed".to_string(),
        }]
    }

    fn describe_plant(&self) -> String {
        let state = self.plant.state();
        format!(
            "OK plant distance={:.1}mm extend={} retract={} fault={:?} reads={}",
            state.distance,
            level_label(state.extend.is_high()),
            level_label(state.retract.is_high()),
            state.fault,
            state.reads,
        )
    }

    fn drain_events(&mut self) -> Vec<String> {
        let events = self.executor.controller().events();
        let lines = events
            .since(self.next_event)
            .map(|record| {
                format!(
                    "  event #{:03} {} @{}mm",
                    record.id, record.event, record.position
                )
            })
            .collect();
        self.next_event = events.next_id();
        lines
    }

    fn log(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    let topics = || HELP_TOPICS.iter().chain(EMULATOR_TOPICS.iter());
    match topic {
        Some(target) => {
            let found = help_for(target).or_else(|| {
                EMULATOR_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                    .map(|(_, detail)| *detail)
            });
            if let Some(detail) = found {
                lines.push(detail.to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                let names: Vec<&str> = topics().map(|(name, _)| *name).collect();
                lines.push(format!("Available topics: {}", names.join(", ")));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in topics() {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn level_label(high: bool) -> &'static str {
    if high { "high" } else { "low" }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-up"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>7} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
