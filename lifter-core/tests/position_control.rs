mod support;

use lifter_core::controller::{MotionState, OffsetDirection, RANGE_FILTER_LEN};
use lifter_core::outputs::Level;
use lifter_core::sensor::SensorConfig;
use lifter_core::telemetry::LifterEvent;
use support::{EXTEND_PIN, RETRACT_PIN, build};

/// Feeds enough identical samples to flush the averaging window.
fn settle(controller: &mut support::TestController) -> OffsetDirection {
    let mut direction = OffsetDirection::SensorFault;
    for _ in 0..RANGE_FILTER_LEN {
        direction = controller.offset_direction();
    }
    direction
}

#[test]
fn init_brakes_before_touching_the_sensor_and_primes_the_filter() {
    let (controller, rig) = build(512);
    let state = rig.state();

    assert_eq!(state.configured, vec![EXTEND_PIN, RETRACT_PIN]);
    assert_eq!(
        &state.writes[..2],
        &[(EXTEND_PIN, Level::Low), (RETRACT_PIN, Level::Low)],
        "both lines must be driven low first"
    );
    assert_eq!(state.writes.len(), 2, "init must not issue any motion command");
    assert_eq!(state.inits, 1);
    assert_eq!(state.applied, Some(SensorConfig::DEFAULT));
    assert_eq!(state.timeout, Some(SensorConfig::DEFAULT.timeout));
    assert_eq!(state.reads, u32::try_from(RANGE_FILTER_LEN).unwrap());

    assert_eq!(controller.motion_state(), MotionState::Braked);
    assert_eq!(controller.current_position(), 512);
    assert_eq!(controller.target_position(), 400);
    assert!(!controller.sensor_fault());
    assert!(controller.events().contains(LifterEvent::FilterPrimed));
}

#[test]
fn scenario_readings_classify_against_target_400() {
    let (mut controller, rig) = build(500);
    assert_eq!(
        controller.offset_direction(),
        OffsetDirection::Below,
        "reading 500 is below a 400 target and needs an upward move"
    );

    rig.set_distance(405);
    assert_eq!(settle(&mut controller), OffsetDirection::OnTarget);

    rig.set_distance(300);
    assert_eq!(settle(&mut controller), OffsetDirection::Above);
}

#[test]
fn dead_zone_edges_are_inclusive_through_the_controller() {
    let (mut controller, rig) = build(400);

    for (distance, expected) in [
        (420, OffsetDirection::OnTarget),
        (380, OffsetDirection::OnTarget),
        (421, OffsetDirection::Below),
        (379, OffsetDirection::Above),
    ] {
        rig.set_distance(distance);
        assert_eq!(
            settle(&mut controller),
            expected,
            "distance {distance} against target 400 +/- 20"
        );
    }
}

#[test]
fn repeated_classification_converges_on_a_stable_reading() {
    let (mut controller, rig) = build(400);
    rig.set_distance(460);

    let first = settle(&mut controller);
    for _ in 0..5 {
        assert_eq!(controller.offset_direction(), first);
    }
    assert_eq!(controller.current_position(), 460);
}

#[test]
fn target_is_clamped_into_mechanical_limits() {
    let (mut controller, _rig) = build(400);

    assert_eq!(controller.set_target_position(950), 800);
    assert_eq!(controller.target_position(), 800);
    assert_eq!(controller.set_target_position(-10), 0);
    assert_eq!(controller.set_target_position(455), 455);

    let latest = controller.events().latest().copied().expect("target event");
    assert_eq!(latest.event, LifterEvent::TargetChanged);
    assert_eq!(latest.position, 455);
}

#[test]
fn regulate_acts_on_the_classification() {
    let (mut controller, rig) = build(500);

    assert_eq!(controller.regulate(), OffsetDirection::Below);
    assert_eq!(controller.motion_state(), MotionState::MovingUp);
    assert_eq!(rig.level(EXTEND_PIN), Level::High);
    assert_eq!(rig.level(RETRACT_PIN), Level::Low);

    rig.set_distance(400);
    let mut direction = OffsetDirection::Below;
    for _ in 0..RANGE_FILTER_LEN {
        direction = controller.regulate();
        if direction == OffsetDirection::OnTarget {
            break;
        }
    }
    assert_eq!(direction, OffsetDirection::OnTarget);
    assert_eq!(controller.motion_state(), MotionState::Braked);
    assert_eq!(rig.level(EXTEND_PIN), Level::Low);

    rig.set_distance(300);
    // Drain the window so the classification sees the new distance.
    for _ in 0..RANGE_FILTER_LEN {
        controller.read_position();
    }
    assert_eq!(controller.regulate(), OffsetDirection::Above);
    assert_eq!(controller.motion_state(), MotionState::MovingDown);
    assert_eq!(rig.level(RETRACT_PIN), Level::High);
}

#[test]
fn status_snapshot_reflects_controller_state() {
    let (mut controller, _rig) = build(500);
    controller.move_up();

    let status = controller.status();
    assert_eq!(status.current_position, 500);
    assert_eq!(status.target_position, 400);
    assert_eq!(status.motion, MotionState::MovingUp);
    assert!(!status.sensor_fault);
    assert_eq!((status.min_position, status.max_position), (0, 800));
    assert_eq!(
        status.to_string(),
        "position=500mm target=400mm motion=moving-up sensor=ok limits=0..800mm"
    );
}
