//! Simulated actuator, distance sensor and clock for the host console.
//!
//! All three handles share one [`PlantState`]; the clock is virtual and only
//! advances when the controller or the console asks it to wait.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use lifter_core::outputs::{ActuatorOutputs, Level, PinId};
use lifter_core::sensor::{RangeMode, RangeSensor, SensorConfig, SensorError};

/// Travel speed while a drive line is high (30 mm/s).
pub const DEFAULT_SPEED_MM_PER_MS: f32 = 0.03;
/// Physical end stops of the simulated actuator.
pub const END_STOPS: (f32, f32) = (60.0, 760.0);

const JITTER_MM: f32 = 1.5;

/// Injected sensor misbehaviour.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SensorFault {
    None,
    /// The next `n` reads time out.
    Transient(u32),
    /// Every read times out and reset fails until cleared.
    Stuck,
}

#[derive(Debug)]
pub struct PlantState {
    pub distance: f32,
    pub speed: f32,
    pub extend_pin: PinId,
    pub retract_pin: PinId,
    pub extend: Level,
    pub retract: Level,
    pub fault: SensorFault,
    pub timed_out: bool,
    pub sensor_config: Option<SensorConfig>,
    pub read_timeout: Duration,
    pub elapsed: Duration,
    pub reads: u64,
    seed: u32,
}

impl PlantState {
    fn advance(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        let travel = self.speed * elapsed.as_secs_f32() * 1_000.0;
        match (self.extend.is_high(), self.retract.is_high()) {
            (true, false) => self.distance -= travel,
            (false, true) => self.distance += travel,
            _ => {}
        }
        self.distance = self.distance.clamp(END_STOPS.0, END_STOPS.1);
    }

    /// Deterministic noise in `-JITTER_MM..=JITTER_MM`.
    fn jitter(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        #[allow(clippy::cast_precision_loss)]
        let unit = (self.seed >> 8) as f32 / (1u32 << 24) as f32;
        (unit * 2.0 - 1.0) * JITTER_MM
    }
}

/// Shared handle to the simulated plant.
#[derive(Clone)]
pub struct SimPlant {
    state: Rc<RefCell<PlantState>>,
}

impl SimPlant {
    pub fn new(distance: f32, extend_pin: PinId, retract_pin: PinId) -> Self {
        Self {
            state: Rc::new(RefCell::new(PlantState {
                distance,
                speed: DEFAULT_SPEED_MM_PER_MS,
                extend_pin,
                retract_pin,
                extend: Level::Low,
                retract: Level::Low,
                fault: SensorFault::None,
                timed_out: false,
                sensor_config: None,
                read_timeout: Duration::ZERO,
                elapsed: Duration::ZERO,
                reads: 0,
                seed: 0x5eed_1f7e,
            })),
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            plant: self.clone(),
        }
    }

    pub fn outputs(&self) -> SimOutputs {
        SimOutputs {
            plant: self.clone(),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            plant: self.clone(),
        }
    }

    pub fn state(&self) -> std::cell::Ref<'_, PlantState> {
        self.state.borrow()
    }

    pub fn inject(&self, fault: SensorFault) {
        self.state.borrow_mut().fault = fault;
    }

    #[cfg(test)]
    pub fn distance(&self) -> f32 {
        self.state.borrow().distance
    }

    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }
}

pub struct SimSensor {
    plant: SimPlant,
}

impl RangeSensor for SimSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        let mut state = self.plant.state.borrow_mut();
        state.advance(Duration::from_millis(2));
        if state.fault == SensorFault::Stuck {
            return Err(SensorError::Bus);
        }
        Ok(())
    }

    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        self.plant.state.borrow_mut().sensor_config = Some(*config);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.plant.state.borrow_mut().read_timeout = timeout;
    }

    fn read_range(&mut self) -> Result<u16, SensorError> {
        let mut state = self.plant.state.borrow_mut();
        state.reads += 1;

        let fault = state.fault;
        match fault {
            SensorFault::Stuck => {
                let timeout = state.read_timeout;
                state.advance(timeout);
                state.timed_out = true;
                return Err(SensorError::Timeout);
            }
            SensorFault::Transient(remaining) if remaining > 0 => {
                let timeout = state.read_timeout;
                state.advance(timeout);
                state.fault = if remaining == 1 {
                    SensorFault::None
                } else {
                    SensorFault::Transient(remaining - 1)
                };
                state.timed_out = true;
                return Err(SensorError::Timeout);
            }
            _ => {}
        }

        // Single-shot conversions take a few milliseconds; continuous mode
        // hands back the latest completed sample.
        let conversion = match state.sensor_config.map(|config| config.mode) {
            Some(RangeMode::Continuous { .. }) => Duration::ZERO,
            _ => Duration::from_millis(8),
        };
        state.advance(conversion);
        state.timed_out = false;

        let noise = state.jitter();
        let reading = state.distance + noise;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let reading = reading.round().clamp(0.0, f32::from(u16::MAX)) as u16;
        Ok(reading)
    }

    fn timeout_occurred(&self) -> bool {
        self.plant.state.borrow().timed_out
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        let mut state = self.plant.state.borrow_mut();
        if state.fault == SensorFault::Stuck {
            return Err(SensorError::Timeout);
        }
        state.timed_out = false;
        Ok(())
    }
}

pub struct SimOutputs {
    plant: SimPlant,
}

impl ActuatorOutputs for SimOutputs {
    fn configure_output(&mut self, _pin: PinId) {}

    fn write_output(&mut self, pin: PinId, level: Level) {
        let mut state = self.plant.state.borrow_mut();
        if pin == state.extend_pin {
            state.extend = level;
        } else if pin == state.retract_pin {
            state.retract = level;
        }
    }
}

/// Virtual clock; waiting moves the actuator according to the drive lines.
pub struct SimDelay {
    plant: SimPlant,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.plant
            .state
            .borrow_mut()
            .advance(Duration::from_nanos(u64::from(ns)));
    }
}
