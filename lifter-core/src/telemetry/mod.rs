//! Diagnostic event catalog and the sinks that collect it.
//!
//! The controller reports every decision it makes (brake, motion start,
//! limit clamp, sensor fault and recovery) to an [`EventSink`]. Sinks are a
//! pure side channel: nothing they do feeds back into control. Firmware keeps
//! an [`EventLog`] ring and mirrors new records to its console, while callers
//! that do not care about diagnostics plug in [`NoopEventSink`].

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::config::Millimeters;
use crate::sensor::SensorError;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Default number of records retained by [`LifterEventLog`].
pub const EVENT_LOG_CAPACITY: usize = 32;

/// Event ring sized for the firmware and emulator.
pub type LifterEventLog = EventLog<EVENT_LOG_CAPACITY>;

/// Direction of a commanded movement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Travel {
    Up,
    Down,
}

impl fmt::Display for Travel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Travel::Up => f.write_str("up"),
            Travel::Down => f.write_str("down"),
        }
    }
}

/// Everything the controller reports to its diagnostics sink.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LifterEvent {
    BrakeAsserted,
    MotionStarted(Travel),
    /// A move was refused because it would run past a mechanical limit.
    LimitClamp(Travel),
    /// A move was refused because the last position read failed.
    MotionRefused(Travel),
    SensorFault(SensorError),
    SensorRecovered,
    SensorRecoveryFailed(SensorError),
    FilterPrimed,
    TargetChanged,
    SelfTestStarted,
    SelfTestPassed,
    SelfTestFailed,
}

impl fmt::Display for LifterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifterEvent::BrakeAsserted => f.write_str("brake"),
            LifterEvent::MotionStarted(travel) => write!(f, "moving-{travel}"),
            LifterEvent::LimitClamp(travel) => write!(f, "limit-clamp {travel}"),
            LifterEvent::MotionRefused(travel) => write!(f, "motion-refused {travel}"),
            LifterEvent::SensorFault(err) => write!(f, "sensor-fault ({err})"),
            LifterEvent::SensorRecovered => f.write_str("sensor-recovered"),
            LifterEvent::SensorRecoveryFailed(err) => {
                write!(f, "sensor-recovery-failed ({err})")
            }
            LifterEvent::FilterPrimed => f.write_str("filter-primed"),
            LifterEvent::TargetChanged => f.write_str("target-changed"),
            LifterEvent::SelfTestStarted => f.write_str("self-test-started"),
            LifterEvent::SelfTestPassed => f.write_str("self-test-passed"),
            LifterEvent::SelfTestFailed => f.write_str("self-test-failed"),
        }
    }
}

impl LifterEvent {
    const BRAKE_CODE: u16 = 0x0001;
    const MOTION_BASE: u16 = 0x0010;
    const CLAMP_BASE: u16 = 0x0012;
    const REFUSED_BASE: u16 = 0x0014;
    const FAULT_BASE: u16 = 0x0020;
    const RECOVERED_CODE: u16 = 0x0022;
    const RECOVERY_FAILED_BASE: u16 = 0x0023;
    const PRIMED_CODE: u16 = 0x0030;
    const TARGET_CODE: u16 = 0x0031;
    const SELF_TEST_STARTED_CODE: u16 = 0x0040;
    const SELF_TEST_PASSED_CODE: u16 = 0x0041;
    const SELF_TEST_FAILED_CODE: u16 = 0x0042;

    /// Encodes the event into a compact code for status advertising.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            LifterEvent::BrakeAsserted => Self::BRAKE_CODE,
            LifterEvent::MotionStarted(travel) => Self::MOTION_BASE + travel_index(travel),
            LifterEvent::LimitClamp(travel) => Self::CLAMP_BASE + travel_index(travel),
            LifterEvent::MotionRefused(travel) => Self::REFUSED_BASE + travel_index(travel),
            LifterEvent::SensorFault(err) => Self::FAULT_BASE + error_index(err),
            LifterEvent::SensorRecovered => Self::RECOVERED_CODE,
            LifterEvent::SensorRecoveryFailed(err) => {
                Self::RECOVERY_FAILED_BASE + error_index(err)
            }
            LifterEvent::FilterPrimed => Self::PRIMED_CODE,
            LifterEvent::TargetChanged => Self::TARGET_CODE,
            LifterEvent::SelfTestStarted => Self::SELF_TEST_STARTED_CODE,
            LifterEvent::SelfTestPassed => Self::SELF_TEST_PASSED_CODE,
            LifterEvent::SelfTestFailed => Self::SELF_TEST_FAILED_CODE,
        }
    }

    /// Decodes a code produced by [`to_raw`](Self::to_raw).
    #[must_use]
    pub const fn from_raw(code: u16) -> Option<Self> {
        let event = match code {
            Self::BRAKE_CODE => LifterEvent::BrakeAsserted,
            Self::RECOVERED_CODE => LifterEvent::SensorRecovered,
            Self::PRIMED_CODE => LifterEvent::FilterPrimed,
            Self::TARGET_CODE => LifterEvent::TargetChanged,
            Self::SELF_TEST_STARTED_CODE => LifterEvent::SelfTestStarted,
            Self::SELF_TEST_PASSED_CODE => LifterEvent::SelfTestPassed,
            Self::SELF_TEST_FAILED_CODE => LifterEvent::SelfTestFailed,
            _ => return Self::from_family_code(code),
        };
        Some(event)
    }

    /// Decodes the codes that carry a direction or error index above a base.
    const fn from_family_code(code: u16) -> Option<Self> {
        if let Some(travel) = travel_at(code, Self::MOTION_BASE) {
            return Some(LifterEvent::MotionStarted(travel));
        }
        if let Some(travel) = travel_at(code, Self::CLAMP_BASE) {
            return Some(LifterEvent::LimitClamp(travel));
        }
        if let Some(travel) = travel_at(code, Self::REFUSED_BASE) {
            return Some(LifterEvent::MotionRefused(travel));
        }
        if let Some(err) = error_at(code, Self::FAULT_BASE) {
            return Some(LifterEvent::SensorFault(err));
        }
        if let Some(err) = error_at(code, Self::RECOVERY_FAILED_BASE) {
            return Some(LifterEvent::SensorRecoveryFailed(err));
        }
        None
    }

    /// Returns `true` for events that indicate something went wrong.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(
            self,
            LifterEvent::LimitClamp(_)
                | LifterEvent::MotionRefused(_)
                | LifterEvent::SensorFault(_)
                | LifterEvent::SensorRecoveryFailed(_)
                | LifterEvent::SelfTestFailed
        )
    }
}

const fn travel_index(travel: Travel) -> u16 {
    match travel {
        Travel::Up => 0,
        Travel::Down => 1,
    }
}

const fn error_index(err: SensorError) -> u16 {
    match err {
        SensorError::Timeout => 0,
        SensorError::Bus => 1,
    }
}

/// Inverse of [`travel_index`] for a code in the family starting at `base`.
const fn travel_at(code: u16, base: u16) -> Option<Travel> {
    match code.wrapping_sub(base) {
        0 => Some(Travel::Up),
        1 => Some(Travel::Down),
        _ => None,
    }
}

/// Inverse of [`error_index`] for a code in the family starting at `base`.
const fn error_at(code: u16, base: u16) -> Option<SensorError> {
    match code.wrapping_sub(base) {
        0 => Some(SensorError::Timeout),
        1 => Some(SensorError::Bus),
        _ => None,
    }
}

/// Event plus the position it relates to.
///
/// `position` is the filtered position at the time of the event, except for
/// [`LifterEvent::TargetChanged`] where it carries the new target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: LifterEvent,
    pub position: Millimeters,
}

/// Receiver for controller diagnostics.
pub trait EventSink {
    fn record(&mut self, event: LifterEvent, position: Millimeters);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn record(&mut self, event: LifterEvent, position: Millimeters) {
        (**self).record(event, position);
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopEventSink;

impl NoopEventSink {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for NoopEventSink {
    fn record(&mut self, _: LifterEvent, _: Millimeters) {}
}

/// Fixed-capacity ring of the most recent events.
pub struct EventLog<const CAPACITY: usize> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> EventLog<CAPACITY> {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns the retained records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns retained records whose id is at least `first_id`.
    pub fn since(&self, first_id: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id >= first_id)
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Id that will be assigned to the next record.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns `true` if any retained record carries `event`.
    #[must_use]
    pub fn contains(&self, event: LifterEvent) -> bool {
        self.ring.oldest_ordered().any(|record| record.event == event)
    }

    /// Drops all retained records; ids keep increasing.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> Default for EventLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> EventSink for EventLog<CAPACITY> {
    fn record(&mut self, event: LifterEvent, position: Millimeters) {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            event,
            position,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip_for_every_event() {
        let events = [
            LifterEvent::BrakeAsserted,
            LifterEvent::MotionStarted(Travel::Up),
            LifterEvent::MotionStarted(Travel::Down),
            LifterEvent::LimitClamp(Travel::Up),
            LifterEvent::LimitClamp(Travel::Down),
            LifterEvent::MotionRefused(Travel::Up),
            LifterEvent::MotionRefused(Travel::Down),
            LifterEvent::SensorFault(SensorError::Timeout),
            LifterEvent::SensorFault(SensorError::Bus),
            LifterEvent::SensorRecovered,
            LifterEvent::SensorRecoveryFailed(SensorError::Timeout),
            LifterEvent::SensorRecoveryFailed(SensorError::Bus),
            LifterEvent::FilterPrimed,
            LifterEvent::TargetChanged,
            LifterEvent::SelfTestStarted,
            LifterEvent::SelfTestPassed,
            LifterEvent::SelfTestFailed,
        ];

        for event in events {
            assert_eq!(LifterEvent::from_raw(event.to_raw()), Some(event));
        }
        assert_eq!(LifterEvent::from_raw(0xFFFF), None);
    }

    #[test]
    fn every_decodable_code_encodes_back_to_itself() {
        let mut decoded = 0;
        for code in 0..=0x00FF {
            if let Some(event) = LifterEvent::from_raw(code) {
                assert_eq!(event.to_raw(), code, "code {code:#06x} decoded to {event}");
                decoded += 1;
            }
        }
        assert_eq!(decoded, 17, "one code per event variant");
    }

    #[test]
    fn log_keeps_most_recent_records_with_increasing_ids() {
        let mut log = EventLog::<2>::new();
        log.record(LifterEvent::BrakeAsserted, 400);
        log.record(LifterEvent::MotionStarted(Travel::Up), 390);
        log.record(LifterEvent::LimitClamp(Travel::Up), 20);

        assert_eq!(log.len(), 2);
        assert_eq!(log.next_id(), 3);

        let latest = log.latest().copied().expect("latest record");
        assert_eq!(latest.id, 2);
        assert_eq!(latest.event, LifterEvent::LimitClamp(Travel::Up));
        assert_eq!(latest.position, 20);

        let ids: heapless::Vec<EventId, 2> = log.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[1, 2]);
        assert_eq!(log.since(2).count(), 1);
        assert!(!log.contains(LifterEvent::BrakeAsserted));
    }

    #[test]
    fn event_labels_are_stable() {
        let mut buffer: heapless::String<48> = heapless::String::new();
        core::fmt::write(
            &mut buffer,
            format_args!("{}", LifterEvent::SensorFault(SensorError::Timeout)),
        )
        .expect("label fits");
        assert_eq!(buffer.as_str(), "sensor-fault (range timeout)");
    }
}
