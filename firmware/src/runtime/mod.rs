use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::time::Hertz;
use embassy_time::Delay;
use lifter_core::config::LifterConfig;
use lifter_core::controller::PositionController;
use lifter_core::outputs::PinId;
use lifter_core::telemetry::LifterEventLog;

use crate::hw::outputs::GpioOutputs;
use crate::hw::vl6180x::Vl6180x;

mod control_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// PA4 drives the H-bridge extend input.
const EXTEND_PIN: PinId = 4;
/// PA5 drives the H-bridge retract input.
const RETRACT_PIN: PinId = 5;

/// Platform limits measured on the trainer frame, in sensor millimetres.
const LIFTER_CONFIG: LifterConfig = LifterConfig::new(EXTEND_PIN, RETRACT_PIN, 150, 650, 8);

pub(crate) type Sensor = Vl6180x<I2c<'static, Blocking>, Delay>;
pub(crate) type Controller = PositionController<Sensor, GpioOutputs<'static>, LifterEventLog>;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA4, PA5, PB6, PB7, I2C1, ..
    } = hal::init(config);

    let outputs = GpioOutputs::new(
        Output::new(PA4, Level::Low, Speed::Low),
        Output::new(PA5, Level::Low, Speed::Low),
        EXTEND_PIN,
        RETRACT_PIN,
    );

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz::khz(400);
    let sensor = Vl6180x::new(I2c::new_blocking(I2C1, PB6, PB7, i2c_config), Delay);

    let controller = match PositionController::new(
        sensor,
        outputs,
        LifterEventLog::new(),
        LIFTER_CONFIG,
    ) {
        Ok(controller) => controller,
        Err(err) => {
            defmt::error!("lifter: invalid config: {}", defmt::Display2Format(&err));
            core::future::pending::<()>().await;
            return;
        }
    };

    spawner
        .spawn(control_task::run(controller))
        .expect("failed to spawn lifter control task");

    core::future::pending::<()>().await;
}
