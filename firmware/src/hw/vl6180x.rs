//! Blocking VL6180X time-of-flight driver.
//!
//! Covers what the lifter needs from the part: the ST-recommended private
//! register load, the default ranging configuration, range scaling,
//! single-shot and continuous ranging, and a polled read with a timeout.
//! Registers use 16-bit big-endian indices.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use lifter_core::sensor::{RangeMode, RangeSensor, SensorConfig, SensorError};

/// Factory default 7-bit address.
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// `RANGE_SCALER` values indexed by scaling factor.
const SCALER_VALUES: [u16; 4] = [0, 253, 127, 84];
const DEFAULT_CROSSTALK_VALID_HEIGHT: u8 = 20;
/// Settling time after stopping continuous ranging.
const STOP_SETTLE_MS: u32 = 300;
const POLL_INTERVAL_MS: u32 = 1;

mod reg {
    pub const SYSTEM_INTERRUPT_CONFIG_GPIO: u16 = 0x014;
    pub const SYSTEM_INTERRUPT_CLEAR: u16 = 0x015;
    pub const SYSTEM_FRESH_OUT_OF_RESET: u16 = 0x016;
    pub const SYSRANGE_START: u16 = 0x018;
    pub const SYSRANGE_INTERMEASUREMENT_PERIOD: u16 = 0x01B;
    pub const SYSRANGE_MAX_CONVERGENCE_TIME: u16 = 0x01C;
    pub const SYSRANGE_CROSSTALK_VALID_HEIGHT: u16 = 0x021;
    pub const SYSRANGE_PART_TO_PART_RANGE_OFFSET: u16 = 0x024;
    pub const SYSRANGE_RANGE_CHECK_ENABLES: u16 = 0x02D;
    pub const SYSRANGE_VHV_RECALIBRATE: u16 = 0x02E;
    pub const SYSRANGE_VHV_REPEAT_RATE: u16 = 0x031;
    pub const SYSALS_INTERMEASUREMENT_PERIOD: u16 = 0x03E;
    pub const SYSALS_ANALOGUE_GAIN: u16 = 0x03F;
    pub const SYSALS_INTEGRATION_PERIOD: u16 = 0x040;
    pub const RESULT_INTERRUPT_STATUS_GPIO: u16 = 0x04F;
    pub const RESULT_RANGE_VAL: u16 = 0x062;
    pub const RANGE_SCALER: u16 = 0x096;
    pub const READOUT_AVERAGING_SAMPLE_PERIOD: u16 = 0x10A;
    pub const INTERLEAVED_MODE_ENABLE: u16 = 0x2A3;
}

/// Private registers loaded once after a power-on reset (AN4545).
const PRIVATE_SETTINGS: [(u16, u8); 30] = [
    (0x207, 0x01),
    (0x208, 0x01),
    (0x096, 0x00),
    (0x097, 0xFD),
    (0x0E3, 0x01),
    (0x0E4, 0x03),
    (0x0E5, 0x02),
    (0x0E6, 0x01),
    (0x0E7, 0x03),
    (0x0F5, 0x02),
    (0x0D9, 0x05),
    (0x0DB, 0xCE),
    (0x0DC, 0x03),
    (0x0DD, 0xF8),
    (0x09F, 0x00),
    (0x0A3, 0x3C),
    (0x0B7, 0x00),
    (0x0BB, 0x3C),
    (0x0B2, 0x09),
    (0x0CA, 0x09),
    (0x198, 0x01),
    (0x1B0, 0x17),
    (0x1AD, 0x00),
    (0x0FF, 0x05),
    (0x100, 0x05),
    (0x199, 0x05),
    (0x1A6, 0x1B),
    (0x1AC, 0x3E),
    (0x1A7, 0x1F),
    (0x030, 0x00),
];

/// Errors raised by the low-level register helpers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Vl6180xError<E> {
    I2c(E),
    /// No result became ready within the timeout.
    Timeout,
}

impl<E> From<E> for Vl6180xError<E> {
    fn from(err: E) -> Self {
        Vl6180xError::I2c(err)
    }
}

impl<E> From<Vl6180xError<E>> for SensorError {
    fn from(err: Vl6180xError<E>) -> Self {
        match err {
            Vl6180xError::I2c(_) => SensorError::Bus,
            Vl6180xError::Timeout => SensorError::Timeout,
        }
    }
}

pub struct Vl6180x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    scaling: u8,
    ptp_offset: u8,
    mode: RangeMode,
    timeout: Duration,
    timed_out: bool,
}

impl<I2C, D, E> Vl6180x<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            scaling: 1,
            ptp_offset: 0,
            mode: RangeMode::SingleShot,
            timeout: Duration::ZERO,
            timed_out: false,
        }
    }

    /// Current range scaling factor.
    pub const fn scaling(&self) -> u8 {
        self.scaling
    }

    /// Loads the private settings if the part is fresh out of reset,
    /// otherwise recovers the scaling already programmed.
    pub fn load_settings(&mut self) -> Result<(), Vl6180xError<E>> {
        self.ptp_offset = self.read_reg(reg::SYSRANGE_PART_TO_PART_RANGE_OFFSET)?;

        if self.read_reg(reg::SYSTEM_FRESH_OUT_OF_RESET)? == 1 {
            self.scaling = 1;
            for (register, value) in PRIVATE_SETTINGS {
                self.write_reg(register, value)?;
            }
            self.write_reg(reg::SYSTEM_FRESH_OUT_OF_RESET, 0)?;
        } else {
            let scaler = self.read_reg16(reg::RANGE_SCALER)?;
            self.scaling = match SCALER_VALUES.iter().rposition(|value| *value == scaler) {
                Some(index @ 2..=3) => u8::try_from(index).unwrap_or(1),
                _ => 1,
            };
            self.ptp_offset = self.ptp_offset.wrapping_mul(self.scaling);
        }
        Ok(())
    }

    /// Applies the recommended ranging defaults with scaling 1.
    pub fn configure_default(&mut self) -> Result<(), Vl6180xError<E>> {
        self.write_reg(reg::READOUT_AVERAGING_SAMPLE_PERIOD, 0x30)?;
        self.write_reg(reg::SYSALS_ANALOGUE_GAIN, 0x46)?;
        self.write_reg(reg::SYSRANGE_VHV_REPEAT_RATE, 0xFF)?;
        self.write_reg16(reg::SYSALS_INTEGRATION_PERIOD, 0x0063)?;
        self.write_reg(reg::SYSRANGE_VHV_RECALIBRATE, 0x01)?;
        self.write_reg(reg::SYSRANGE_INTERMEASUREMENT_PERIOD, 0x09)?;
        self.write_reg(reg::SYSALS_INTERMEASUREMENT_PERIOD, 0x31)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CONFIG_GPIO, 0x24)?;
        self.write_reg(reg::SYSRANGE_MAX_CONVERGENCE_TIME, 0x31)?;
        self.write_reg(reg::INTERLEAVED_MODE_ENABLE, 0)?;
        self.set_scaling(1)
    }

    /// Sets the range scaling factor. Values outside `1..=3` are ignored.
    pub fn set_scaling(&mut self, scaling: u8) -> Result<(), Vl6180xError<E>> {
        if !(1..=3).contains(&scaling) {
            return Ok(());
        }
        self.scaling = scaling;
        self.write_reg16(reg::RANGE_SCALER, SCALER_VALUES[usize::from(scaling)])?;
        self.write_reg(reg::SYSRANGE_PART_TO_PART_RANGE_OFFSET, self.ptp_offset / scaling)?;
        self.write_reg(
            reg::SYSRANGE_CROSSTALK_VALID_HEIGHT,
            DEFAULT_CROSSTALK_VALID_HEIGHT / scaling,
        )?;
        let enables = self.read_reg(reg::SYSRANGE_RANGE_CHECK_ENABLES)?;
        self.write_reg(
            reg::SYSRANGE_RANGE_CHECK_ENABLES,
            (enables & 0xFE) | u8::from(scaling == 1),
        )
    }

    /// Starts continuous ranging; `period` is rounded down to 10 ms steps.
    pub fn start_continuous(&mut self, period: Duration) -> Result<(), Vl6180xError<E>> {
        let steps = (period.as_millis() / 10).saturating_sub(1).min(254);
        let steps = u8::try_from(steps).unwrap_or(254);
        self.write_reg(reg::SYSRANGE_INTERMEASUREMENT_PERIOD, steps)?;
        self.write_reg(reg::SYSRANGE_START, 0x03)
    }

    /// Toggles ranging off. May trigger one last single-shot measurement.
    pub fn stop_continuous(&mut self) -> Result<(), Vl6180xError<E>> {
        self.write_reg(reg::SYSRANGE_START, 0x01)
    }

    /// Reads one range sample in millimetres, triggering it first in single-shot mode.
    pub fn measure(&mut self) -> Result<u16, Vl6180xError<E>> {
        if self.mode == RangeMode::SingleShot {
            self.write_reg(reg::SYSRANGE_START, 0x01)?;
        }
        self.wait_for_range()?;
        let raw = self.read_reg(reg::RESULT_RANGE_VAL)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        Ok(u16::from(raw) * u16::from(self.scaling))
    }

    fn wait_for_range(&mut self) -> Result<(), Vl6180xError<E>> {
        let budget_ms = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let mut waited_ms = 0u32;
        loop {
            let status = self.read_reg(reg::RESULT_INTERRUPT_STATUS_GPIO)?;
            if status & 0x07 == 0x04 {
                return Ok(());
            }
            // A zero budget waits indefinitely.
            if budget_ms > 0 && waited_ms >= budget_ms {
                return Err(Vl6180xError::Timeout);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
            waited_ms = waited_ms.saturating_add(POLL_INTERVAL_MS);
        }
    }

    fn read_reg(&mut self, register: u16) -> Result<u8, Vl6180xError<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &register.to_be_bytes(), &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_reg16(&mut self, register: u16) -> Result<u16, Vl6180xError<E>> {
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(self.address, &register.to_be_bytes(), &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    fn write_reg(&mut self, register: u16, value: u8) -> Result<(), Vl6180xError<E>> {
        let [high, low] = register.to_be_bytes();
        self.i2c.write(self.address, &[high, low, value])?;
        Ok(())
    }

    fn write_reg16(&mut self, register: u16, value: u16) -> Result<(), Vl6180xError<E>> {
        let [high, low] = register.to_be_bytes();
        let [value_high, value_low] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[high, low, value_high, value_low])?;
        Ok(())
    }
}

impl<I2C, D, E> RangeSensor for Vl6180x<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    fn init(&mut self) -> Result<(), SensorError> {
        self.load_settings()?;
        self.configure_default()?;
        Ok(())
    }

    fn configure(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        self.set_scaling(config.scaling)?;
        match config.mode {
            RangeMode::SingleShot => {}
            RangeMode::Continuous { period } => {
                self.write_reg(reg::SYSRANGE_MAX_CONVERGENCE_TIME, 30)?;
                self.stop_continuous()?;
                self.delay.delay_ms(STOP_SETTLE_MS);
                self.start_continuous(period)?;
            }
        }
        self.mode = config.mode;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn read_range(&mut self) -> Result<u16, SensorError> {
        match self.measure() {
            Ok(distance) => {
                self.timed_out = false;
                Ok(distance)
            }
            Err(err) => {
                if matches!(err, Vl6180xError::Timeout) {
                    self.timed_out = true;
                }
                Err(err.into())
            }
        }
    }

    fn timeout_occurred(&self) -> bool {
        self.timed_out
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        if matches!(self.mode, RangeMode::Continuous { .. }) {
            self.stop_continuous()?;
            self.delay.delay_ms(STOP_SETTLE_MS);
            self.mode = RangeMode::SingleShot;
        }
        // Clear range, ALS and error interrupts.
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x07)?;
        self.timed_out = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    /// Register file behind a fake I2C bus.
    struct FakeBus {
        registers: [u8; 0x300],
        pointer: u16,
        writes: Vec<(u16, u8)>,
        ready: bool,
        nack: bool,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut registers = [0u8; 0x300];
            registers[usize::from(reg::SYSTEM_FRESH_OUT_OF_RESET)] = 1;
            Self {
                registers,
                pointer: 0,
                writes: Vec::new(),
                ready: true,
                nack: false,
            }
        }

        fn get(&self, register: u16) -> u8 {
            self.registers[usize::from(register)]
        }

        fn wrote(&self, register: u16, value: u8) -> bool {
            self.writes.contains(&(register, value))
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.nack || address != DEFAULT_ADDRESS {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        self.pointer = u16::from_be_bytes([bytes[0], bytes[1]]);
                        for value in &bytes[2..] {
                            self.writes.push((self.pointer, *value));
                            self.registers[usize::from(self.pointer)] = *value;
                            self.pointer += 1;
                        }
                    }
                    Operation::Read(buffer) => {
                        for slot in buffer.iter_mut() {
                            *slot = if self.pointer == reg::RESULT_INTERRUPT_STATUS_GPIO {
                                if self.ready { 0x04 } else { 0x00 }
                            } else {
                                self.registers[usize::from(self.pointer)]
                            };
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        waited_ms: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waited_ms += ns / 1_000_000;
        }
    }

    fn sensor() -> Vl6180x<FakeBus, CountingDelay> {
        Vl6180x::new(FakeBus::new(), CountingDelay::default())
    }

    #[test]
    fn fresh_part_gets_private_settings_once() {
        let mut sensor = sensor();
        sensor.init().unwrap();

        assert!(sensor.i2c.wrote(0x207, 0x01));
        assert!(sensor.i2c.wrote(0x030, 0x00));
        assert_eq!(sensor.i2c.get(reg::SYSTEM_FRESH_OUT_OF_RESET), 0);
        assert_eq!(sensor.scaling(), 1);

        sensor.i2c.writes.clear();
        sensor.init().unwrap();
        assert!(!sensor.i2c.wrote(0x207, 0x01));
    }

    #[test]
    fn scaling_three_programs_scaler_and_multiplies_results() {
        let mut sensor = sensor();
        sensor.init().unwrap();
        sensor.configure(&SensorConfig::DEFAULT).unwrap();
        sensor.set_timeout(Duration::from_millis(500));

        assert_eq!(sensor.scaling(), 3);
        let scaler = u16::from_be_bytes([sensor.i2c.get(0x096), sensor.i2c.get(0x097)]);
        assert_eq!(scaler, 84);
        assert_eq!(sensor.i2c.get(reg::SYSRANGE_CROSSTALK_VALID_HEIGHT), 6);

        sensor.i2c.registers[usize::from(reg::RESULT_RANGE_VAL)] = 140;
        sensor.i2c.writes.clear();
        assert_eq!(sensor.read_range(), Ok(420));
        assert!(sensor.i2c.wrote(reg::SYSRANGE_START, 0x01));
        assert!(sensor.i2c.wrote(reg::SYSTEM_INTERRUPT_CLEAR, 0x01));
    }

    #[test]
    fn reinitialising_a_configured_part_recovers_scaling() {
        let mut sensor = sensor();
        sensor.init().unwrap();
        sensor.configure(&SensorConfig::DEFAULT).unwrap();

        let bus = sensor.i2c;
        let mut sensor = Vl6180x::new(bus, CountingDelay::default());
        sensor.load_settings().unwrap();
        assert_eq!(sensor.scaling(), 3);
    }

    #[test]
    fn missing_result_times_out_and_latches_until_reset() {
        let mut sensor = sensor();
        sensor.init().unwrap();
        sensor.configure(&SensorConfig::DEFAULT).unwrap();
        sensor.set_timeout(Duration::from_millis(500));
        sensor.i2c.ready = false;

        assert_eq!(sensor.read_range(), Err(SensorError::Timeout));
        assert!(sensor.timeout_occurred());
        assert_eq!(sensor.delay.waited_ms, 500);

        sensor.i2c.ready = true;
        sensor.reset().unwrap();
        assert!(!sensor.timeout_occurred());
        assert!(sensor.i2c.wrote(reg::SYSTEM_INTERRUPT_CLEAR, 0x07));
    }

    #[test]
    fn continuous_mode_skips_the_start_trigger() {
        let mut sensor = sensor();
        sensor.init().unwrap();
        let config = SensorConfig::DEFAULT.continuous(Duration::from_millis(100));
        sensor.configure(&config).unwrap();

        assert!(sensor.i2c.wrote(reg::SYSRANGE_INTERMEASUREMENT_PERIOD, 9));
        assert!(sensor.i2c.wrote(reg::SYSRANGE_START, 0x03));

        sensor.i2c.writes.clear();
        sensor.i2c.registers[usize::from(reg::RESULT_RANGE_VAL)] = 100;
        assert_eq!(sensor.read_range(), Ok(300));
        assert!(!sensor.i2c.wrote(reg::SYSRANGE_START, 0x01));

        sensor.reset().unwrap();
        assert!(sensor.i2c.wrote(reg::SYSRANGE_START, 0x01));
    }

    #[test]
    fn bus_failures_map_to_bus_errors() {
        let mut sensor = sensor();
        sensor.i2c.nack = true;

        assert_eq!(sensor.init(), Err(SensorError::Bus));
        assert_eq!(sensor.read_range(), Err(SensorError::Bus));
        assert!(!sensor.timeout_occurred());
    }
}
