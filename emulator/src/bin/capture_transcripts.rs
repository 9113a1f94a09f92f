use std::io;

#[allow(dead_code)]
#[path = "../plant.rs"]
mod plant;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Regulate)?;
    record_profile(TranscriptProfile::Fault)?;
    record_profile(TranscriptProfile::SelfTest)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Regulate => &[
            "status",
            "offset",
            "regulate 60",
            "target 600",
            "regulate 60",
            "target 900",
            "status",
        ],
        TranscriptProfile::Fault => &[
            "regulate 5",
            "fault 2",
            "read",
            "read",
            "offset",
            "fault stuck",
            "regulate 3",
            "up",
            "fault clear",
            "regulate 60",
            "status",
        ],
        TranscriptProfile::SelfTest => &["plant", "selftest", "status", "plant"],
    };

    for line in script {
        session.handle_command(line)?;
    }
    Ok(())
}
