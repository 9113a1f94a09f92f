mod plant;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: lifter-emulator [--no-log] [--profile <regulate|fault|selftest>]";

/// Command-line switches for the interactive console.
struct Options {
    /// `None` runs without writing a transcript.
    transcript: Option<TranscriptProfile>,
}

fn main() -> io::Result<()> {
    let options = Options::from_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = match options.transcript {
        Some(profile) => Session::new(profile)?,
        None => Session::detached()?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Lifter Emulator ready. `help` lists commands, `quit` leaves.")?;
    for line in session.handle_command("status")? {
        writeln!(out, "{line}")?;
    }
    prompt(&mut out)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let command = line.trim();
        if is_exit(command) {
            writeln!(out, "Session closed.")?;
            return Ok(());
        }
        if !command.is_empty() {
            for response in session.handle_command(command)? {
                writeln!(out, "{response}")?;
            }
        }
        prompt(&mut out)?;
    }

    // EOF
    writeln!(out)?;
    Ok(())
}

fn prompt(out: &mut impl Write) -> io::Result<()> {
    write!(out, "lifter> ")?;
    out.flush()
}

fn is_exit(command: &str) -> bool {
    ["exit", "quit"]
        .iter()
        .any(|word| command.eq_ignore_ascii_case(word))
}

impl Options {
    fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut transcript = Some(TranscriptProfile::Regulate);
        let mut log = true;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--no-log" {
                log = false;
            } else if let Some(tag) = arg.strip_prefix("--profile=") {
                transcript = Some(TranscriptProfile::from_tag(tag)?);
            } else if arg == "--profile" {
                let tag = args
                    .next()
                    .ok_or_else(|| "Expected value after --profile".to_string())?;
                transcript = Some(TranscriptProfile::from_tag(&tag)?);
            } else {
                return Err(format!("Unexpected argument `{arg}`"));
            }
        }

        Ok(Self {
            transcript: transcript.filter(|_| log),
        })
    }
}
