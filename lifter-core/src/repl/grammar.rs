//! Parser for single-line lifter console commands.
//!
//! The grammar is small enough to parse straight from the input `&str` with
//! `winnow` combinators; keywords are case-insensitive and surrounding
//! whitespace is ignored.

use core::fmt;

use winnow::ascii::{Caseless, dec_uint, space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode, ModalResult};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

/// Upper bound for `regulate <n>` so a typo cannot stall the console.
pub const MAX_REGULATE_ITERATIONS: u16 = 600;

/// One-line help for every console command, keyed by its keyword.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("target", "target <mm>     - set the target position"),
    ("up", "up              - extend the actuator (clamped at the upper limit)"),
    ("down", "down            - retract the actuator (clamped at the lower limit)"),
    ("brake", "brake           - stop and re-sample the position"),
    ("read", "read            - take one filtered position reading"),
    ("offset", "offset          - classify the position against the target"),
    ("regulate", "regulate [n]    - run n control loop iterations"),
    ("status", "status          - show position, target and motion state"),
    ("selftest", "selftest        - run the basic up/down motion check"),
    ("help", "help [topic]    - list commands or describe one"),
];

/// Looks up the help line for `topic`, ignoring case.
#[must_use]
pub fn help_for(topic: &str) -> Option<&'static str> {
    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, detail)| *detail)
}

/// Parsed console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LifterCommand {
    /// `target <mm>`
    Target(u16),
    /// `up`
    Up,
    /// `down`
    Down,
    /// `brake`
    Brake,
    /// `read`
    Read,
    /// `offset`
    Offset,
    /// `regulate [n]`, one iteration when omitted.
    Regulate(u16),
    /// `status`
    Status,
    /// `selftest`
    SelfTest,
    /// `help [topic]`, carrying the topic's help line when one was named.
    Help(Option<&'static str>),
}

/// Parse failure with the byte offset where parsing stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrammarError {
    Empty,
    Unrecognized { offset: usize },
    IterationsOutOfRange(u16),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::Empty => f.write_str("empty command"),
            GrammarError::Unrecognized { offset } => {
                write!(f, "unrecognized input at column {offset}")
            }
            GrammarError::IterationsOutOfRange(count) => write!(
                f,
                "regulate count {count} outside 1-{MAX_REGULATE_ITERATIONS}"
            ),
        }
    }
}

/// Parses one console line.
///
/// # Errors
/// Returns [`GrammarError`] for blank lines, unknown keywords, malformed
/// numbers, or a `regulate` count outside the supported range.
pub fn parse_command(line: &str) -> Result<LifterCommand, GrammarError> {
    if line.trim().is_empty() {
        return Err(GrammarError::Empty);
    }

    let command = delimited(space0, command, space0)
        .parse(line)
        .map_err(|err| GrammarError::Unrecognized {
            offset: err.offset(),
        })?;

    if let LifterCommand::Regulate(count) = command
        && !(1..=MAX_REGULATE_ITERATIONS).contains(&count)
    {
        return Err(GrammarError::IterationsOutOfRange(count));
    }
    Ok(command)
}

fn command(input: &mut &str) -> ModalResult<LifterCommand> {
    alt((
        target,
        regulate,
        keyword("selftest").value(LifterCommand::SelfTest),
        keyword("status").value(LifterCommand::Status),
        keyword("offset").value(LifterCommand::Offset),
        keyword("brake").value(LifterCommand::Brake),
        keyword("read").value(LifterCommand::Read),
        keyword("down").value(LifterCommand::Down),
        help,
        keyword("up").value(LifterCommand::Up),
    ))
    .parse_next(input)
}

fn target(input: &mut &str) -> ModalResult<LifterCommand> {
    preceded((keyword("target"), space1), dec_uint)
        .map(LifterCommand::Target)
        .parse_next(input)
}

fn regulate(input: &mut &str) -> ModalResult<LifterCommand> {
    preceded(keyword("regulate"), opt(preceded(space1, dec_uint)))
        .map(|count: Option<u16>| LifterCommand::Regulate(count.unwrap_or(1)))
        .parse_next(input)
}

fn help(input: &mut &str) -> ModalResult<LifterCommand> {
    let topic = take_while(1.., |c: char| c.is_ascii_alphabetic()).verify_map(help_for);
    preceded(keyword("help"), opt(preceded(space1, topic)))
        .map(LifterCommand::Help)
        .parse_next(input)
}

fn keyword<'i>(word: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    literal(Caseless(word))
}
