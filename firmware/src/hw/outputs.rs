//! Actuator drive lines on STM32 GPIO.

use embassy_stm32::gpio::{self, Output};
use lifter_core::outputs::{ActuatorOutputs, Level, PinId};

/// Push-pull outputs wired to the H-bridge extend/retract inputs.
pub struct GpioOutputs<'d> {
    extend: Output<'d>,
    retract: Output<'d>,
    extend_pin: PinId,
    retract_pin: PinId,
}

impl<'d> GpioOutputs<'d> {
    /// Both outputs must already be configured low.
    pub fn new(
        extend: Output<'d>,
        retract: Output<'d>,
        extend_pin: PinId,
        retract_pin: PinId,
    ) -> Self {
        Self {
            extend,
            retract,
            extend_pin,
            retract_pin,
        }
    }
}

impl ActuatorOutputs for GpioOutputs<'_> {
    // Pins are put in push-pull mode when the `Output`s are created.
    fn configure_output(&mut self, _pin: PinId) {}

    fn write_output(&mut self, pin: PinId, level: Level) {
        let level = if level.is_high() {
            gpio::Level::High
        } else {
            gpio::Level::Low
        };
        if pin == self.extend_pin {
            self.extend.set_level(level);
        } else if pin == self.retract_pin {
            self.retract.set_level(level);
        } else {
            defmt::warn!("lifter: write to unmapped pin {}", pin);
        }
    }
}
