#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use lifter_core::config::LifterConfig;
use lifter_core::controller::PositionController;
use lifter_core::outputs::{ActuatorOutputs, Level, PinId};
use lifter_core::sensor::{RangeSensor, SensorConfig, SensorError};
use lifter_core::telemetry::LifterEventLog;

pub const EXTEND_PIN: PinId = 4;
pub const RETRACT_PIN: PinId = 5;

/// min=0, max=800, bandwidth=20, default target 400.
pub fn scenario_config() -> LifterConfig {
    LifterConfig::new(EXTEND_PIN, RETRACT_PIN, 0, 800, 20)
}

pub type TestController = PositionController<MockSensor, MockOutputs, LifterEventLog>;

/// Builds a controller over a rig whose sensor currently reads `distance`.
pub fn build(distance: u16) -> (TestController, Rig) {
    build_with(distance, scenario_config())
}

pub fn build_with(distance: u16, config: LifterConfig) -> (TestController, Rig) {
    let rig = Rig::new(distance);
    let controller = PositionController::new(
        rig.sensor(),
        rig.outputs(),
        LifterEventLog::new(),
        config,
    )
    .expect("scenario config is valid");
    (controller, rig)
}

#[derive(Debug)]
pub struct RigState {
    /// Distance reported by the sensor, in millimetres.
    pub distance: f32,
    /// Plant speed while a drive line is high, in mm per ms.
    pub speed: f32,
    pub levels: [(PinId, Level); 2],
    pub configured: Vec<PinId>,
    pub writes: Vec<(PinId, Level)>,
    /// Values returned before falling back to `distance`.
    pub scripted: VecDeque<u16>,
    /// Number of upcoming reads that time out.
    pub pending_timeouts: u32,
    /// When set, `reset` fails and the fault flag stays raised.
    pub stuck: bool,
    pub timed_out: bool,
    pub reads: u32,
    pub inits: u32,
    pub resets: u32,
    pub applied: Option<SensorConfig>,
    pub timeout: Option<Duration>,
}

/// Shared handle to a simulated actuator, sensor and clock.
#[derive(Clone)]
pub struct Rig {
    state: Rc<RefCell<RigState>>,
}

impl Rig {
    pub fn new(distance: u16) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                distance: f32::from(distance),
                speed: 0.0625,
                levels: [(EXTEND_PIN, Level::Low), (RETRACT_PIN, Level::Low)],
                configured: Vec::new(),
                writes: Vec::new(),
                scripted: VecDeque::new(),
                pending_timeouts: 0,
                stuck: false,
                timed_out: false,
                reads: 0,
                inits: 0,
                resets: 0,
                applied: None,
                timeout: None,
            })),
        }
    }

    pub fn sensor(&self) -> MockSensor {
        MockSensor { rig: self.clone() }
    }

    pub fn outputs(&self) -> MockOutputs {
        MockOutputs { rig: self.clone() }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { rig: self.clone() }
    }

    pub fn state(&self) -> std::cell::Ref<'_, RigState> {
        self.state.borrow()
    }

    pub fn set_distance(&self, distance: u16) {
        self.state.borrow_mut().distance = f32::from(distance);
    }

    pub fn set_speed(&self, speed: f32) {
        self.state.borrow_mut().speed = speed;
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.state.borrow_mut().pending_timeouts = count;
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.state.borrow_mut().stuck = stuck;
    }

    pub fn script(&self, samples: &[u16]) {
        self.state.borrow_mut().scripted.extend(samples.iter().copied());
    }

    pub fn level(&self, pin: PinId) -> Level {
        self.state
            .borrow()
            .levels
            .iter()
            .find(|(id, _)| *id == pin)
            .map_or(Level::Low, |(_, level)| *level)
    }

    pub fn write_count(&self) -> usize {
        self.state.borrow().writes.len()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }
}

pub struct MockSensor {
    rig: Rig,
}

impl RangeSensor for MockSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        let mut state = self.rig.state.borrow_mut();
        state.inits += 1;
        if state.stuck {
            Err(SensorError::Bus)
        } else {
            Ok(())
        }
    }

    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        self.rig.state.borrow_mut().applied = Some(*config);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.rig.state.borrow_mut().timeout = Some(timeout);
    }

    fn read_range(&mut self) -> Result<u16, SensorError> {
        let mut state = self.rig.state.borrow_mut();
        state.reads += 1;
        if state.stuck || state.pending_timeouts > 0 {
            state.pending_timeouts = state.pending_timeouts.saturating_sub(1);
            state.timed_out = true;
            return Err(SensorError::Timeout);
        }
        state.timed_out = false;
        if let Some(sample) = state.scripted.pop_front() {
            return Ok(sample);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sample = state.distance.max(0.0) as u16;
        Ok(sample)
    }

    fn timeout_occurred(&self) -> bool {
        self.rig.state.borrow().timed_out
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        let mut state = self.rig.state.borrow_mut();
        state.resets += 1;
        if state.stuck {
            return Err(SensorError::Timeout);
        }
        state.timed_out = false;
        Ok(())
    }
}

pub struct MockOutputs {
    rig: Rig,
}

impl ActuatorOutputs for MockOutputs {
    fn configure_output(&mut self, pin: PinId) {
        self.rig.state.borrow_mut().configured.push(pin);
    }

    fn write_output(&mut self, pin: PinId, level: Level) {
        let mut state = self.rig.state.borrow_mut();
        state.writes.push((pin, level));
        if let Some(slot) = state.levels.iter_mut().find(|(id, _)| *id == pin) {
            slot.1 = level;
        }
    }
}

/// Advances the plant while the actuator is driven.
pub struct MockDelay {
    rig: Rig,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        let mut state = self.rig.state.borrow_mut();
        #[allow(clippy::cast_precision_loss)]
        let ms = ns as f32 / 1_000_000.0;
        let extend = state.levels[0].1.is_high();
        let retract = state.levels[1].1.is_high();
        let travel = state.speed * ms;
        match (extend, retract) {
            (true, false) => state.distance -= travel,
            (false, true) => state.distance += travel,
            _ => {}
        }
    }
}
