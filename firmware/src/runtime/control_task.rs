use embassy_time::{Delay, Duration, Instant, Ticker};

use super::Controller;
use crate::telemetry::{TelemetryForwarder, log_status};

/// One regulation step per sensor sample (10 Hz).
const CONTROL_PERIOD: Duration = Duration::from_millis(100);
/// Iterations between status snapshots (about 5 s).
const STATUS_EVERY: u32 = 50;

#[embassy_executor::task]
pub async fn run(mut controller: Controller) -> ! {
    let mut telemetry = TelemetryForwarder::new();

    let self_test = controller.test_basic_motion(&mut Delay);
    telemetry.forward(controller.events(), Instant::now());
    if let Err(failure) = self_test {
        defmt::error!(
            "lifter: self-test failed, staying braked: {}",
            defmt::Display2Format(&failure)
        );
    }

    // A failed self-test leaves the actuator braked; keep sampling for telemetry.
    let regulating = self_test.is_ok();
    let mut ticker = Ticker::every(CONTROL_PERIOD);
    let mut iteration: u32 = 0;
    loop {
        if regulating {
            let direction = controller.regulate();
            defmt::trace!("lifter: {}", defmt::Display2Format(&direction));
        } else {
            controller.read_position();
        }

        let now = Instant::now();
        telemetry.forward(controller.events(), now);
        iteration = iteration.wrapping_add(1);
        if iteration % STATUS_EVERY == 0 {
            log_status(&controller.status(), now);
        }

        ticker.next().await;
    }
}
