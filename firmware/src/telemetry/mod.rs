//! Mirrors controller events to defmt (or stdout on the host).
//!
//! The controller records into a [`LifterEventLog`]; the control task calls
//! [`TelemetryForwarder::forward`] once per iteration to log whatever is new.

use embassy_time::Instant;
use lifter_core::controller::LifterStatus;
use lifter_core::telemetry::{EventId, LifterEventLog, TelemetryRecord};

/// Tracks which log records have already been emitted.
pub struct TelemetryForwarder {
    next_event: EventId,
    dropped: u32,
}

impl TelemetryForwarder {
    pub const fn new() -> Self {
        Self {
            next_event: 0,
            dropped: 0,
        }
    }

    /// Emits every record added since the last call and returns how many.
    ///
    /// Records that scrolled out of the ring in between are counted as dropped.
    pub fn forward(&mut self, log: &LifterEventLog, now: Instant) -> usize {
        let timestamp_ms = now.as_millis();
        let mut forwarded = 0;
        for record in log.since(self.next_event) {
            if forwarded == 0 && record.id > self.next_event {
                let missed = record.id - self.next_event;
                self.dropped = self.dropped.saturating_add(missed);
                emit_gap(missed);
            }
            emit_record(record, timestamp_ms);
            forwarded += 1;
        }
        self.next_event = log.next_id();
        forwarded
    }

    /// Records lost because the ring wrapped before they were forwarded.
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Default for TelemetryForwarder {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs a one-line controller snapshot.
pub fn log_status(status: &LifterStatus, now: Instant) {
    emit_status(status, now.as_millis());
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord, timestamp_ms: u64) {
    if record.event.is_warning() {
        defmt::warn!(
            "telemetry:lifter #{} {} @{}mm t={}ms",
            record.id,
            defmt::Display2Format(&record.event),
            record.position,
            timestamp_ms
        );
    } else {
        defmt::info!(
            "telemetry:lifter #{} {} @{}mm t={}ms",
            record.id,
            defmt::Display2Format(&record.event),
            record.position,
            timestamp_ms
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord, timestamp_ms: u64) {
    let level = if record.event.is_warning() { "WARN" } else { "INFO" };
    println!(
        "{level} telemetry:lifter #{} {} @{}mm t={}ms",
        record.id, record.event, record.position, timestamp_ms
    );
}

#[cfg(target_os = "none")]
fn emit_gap(missed: u32) {
    defmt::warn!("telemetry:lifter {} event(s) dropped", missed);
}

#[cfg(not(target_os = "none"))]
fn emit_gap(missed: u32) {
    println!("WARN telemetry:lifter {missed} event(s) dropped");
}

#[cfg(target_os = "none")]
fn emit_status(status: &LifterStatus, timestamp_ms: u64) {
    defmt::info!(
        "status:lifter {} t={}ms",
        defmt::Display2Format(status),
        timestamp_ms
    );
}

#[cfg(not(target_os = "none"))]
fn emit_status(status: &LifterStatus, timestamp_ms: u64) {
    println!("INFO status:lifter {status} t={timestamp_ms}ms");
}
