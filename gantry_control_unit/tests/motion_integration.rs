//! Integration tests: the wired motion core against the simulated gantry.
//!
//! Covers the end-to-end scenarios:
//! 1. Emergency stop and operator recovery
//! 2. X/Y calibration to the start limits
//! 3. Closed jog loop: motor drive → simulated motion → quadrature
//!    feedback → position reconciliation
//! 4. Stepper pulse accounting through the control loop

use gantry_common::signal::{InputLine, Level, OutputLine};
use gantry_common::timer::StepTimer;
use gantry_common::types::{Axis, LimitFlags, MotorCommand};
use gantry_hal::sim::{SimDisplay, SimulatedGantry};

use gantry_control_unit::config::MotionConfig;
use gantry_control_unit::coordinator::{
    CalibrationRoutine, CalibrationStatus, MotionCoordinator,
};
use gantry_control_unit::cycle::CycleRunner;
use gantry_control_unit::dcmotor::DcMotor;
use gantry_control_unit::emergency::{EmergencyLatch, EmergencySupervisor, SupervisorState};
use gantry_control_unit::encoder::{JogEncoder, UiEncoder, UiEvent};
use gantry_control_unit::position::{AxisPositions, SharedPositions, TargetPositions};
use gantry_control_unit::stepper::{StepperChannel, StepperDriver, StepperIsr};

// ── Helpers ─────────────────────────────────────────────────────────

fn test_config() -> MotionConfig {
    MotionConfig {
        jog_tolerance: 1,
        button_settle_ticks: 2,
        status_interval: 1_000_000,
        ..MotionConfig::default()
    }
}

fn dc_motor(name: &'static str, axis: &gantry_hal::sim::SimDcAxis) -> DcMotor {
    DcMotor::new(
        name,
        OutputLine::active_high(axis.dir_forward.clone()),
        OutputLine::active_high(axis.dir_backward.clone()),
        InputLine::active_low(axis.limit_end.clone()),
        InputLine::active_low(axis.limit_start.clone()),
    )
}

fn z_stepper(gantry: &SimulatedGantry, positions: SharedPositions) -> StepperDriver {
    StepperDriver::new(
        "z",
        StepperChannel::new(
            OutputLine::active_high(gantry.z_dir.clone()),
            OutputLine::active_high(gantry.z_step.clone()),
        ),
        StepperChannel::new(
            OutputLine::active_high(gantry.grip_dir.clone()),
            OutputLine::active_high(gantry.grip_step.clone()),
        ),
        Some(InputLine::active_low(gantry.z_limit_end.clone())),
        Some(InputLine::active_low(gantry.z_limit_start.clone())),
        gantry.timer.clone(),
        positions,
    )
}

fn coordinator(gantry: &SimulatedGantry, positions: SharedPositions) -> MotionCoordinator {
    MotionCoordinator::new(
        dc_motor("x", &gantry.x),
        dc_motor("y", &gantry.y),
        z_stepper(gantry, positions.clone()),
        positions,
    )
}

struct Rig {
    runner: CycleRunner,
    gantry: SimulatedGantry,
    display: SimDisplay,
    latch: EmergencyLatch,
    isr: StepperIsr,
}

fn rig() -> Rig {
    let config = test_config();
    let gantry = SimulatedGantry::new();
    let display = SimDisplay::new();
    let positions = AxisPositions::shared();

    let coordinator = coordinator(&gantry, positions.clone());
    let isr = coordinator.z().isr();

    let latch = EmergencyLatch::new();
    let supervisor = EmergencySupervisor::new(
        latch.clone(),
        InputLine::active_low(gantry.estop_line.clone()),
        InputLine::active_low(gantry.ui_button.clone()),
    );

    let ui = UiEncoder::new(
        InputLine::active_low(gantry.ui_a.clone()),
        InputLine::active_low(gantry.ui_b.clone()),
        InputLine::active_low(gantry.ui_button.clone()),
        config.button_settle_ticks,
    );
    let jog_x = JogEncoder::new(
        InputLine::active_low(gantry.x.enc_a.clone()),
        InputLine::active_low(gantry.x.enc_b.clone()),
        config.jog_tolerance,
    );
    let jog_y = JogEncoder::new(
        InputLine::active_low(gantry.y.enc_a.clone()),
        InputLine::active_low(gantry.y.enc_b.clone()),
        config.jog_tolerance,
    );

    let runner = CycleRunner::new(
        config,
        Box::new(display.clone()),
        supervisor,
        coordinator,
        ui,
        jog_x,
        jog_y,
        positions,
    );

    Rig {
        runner,
        gantry,
        display,
        latch,
        isr,
    }
}

fn no_ui(_event: UiEvent, _targets: &mut TargetPositions) {}

/// Complete a pending stepper pulse in hardware order.
fn fire_timer_if_armed(rig: &Rig) {
    if rig.gantry.timer.is_armed() {
        rig.isr.on_compare_match();
        rig.isr.on_overflow();
    }
}

// ── Emergency scenario ──────────────────────────────────────────────

#[test]
fn emergency_stops_all_axes_within_one_iteration() {
    let mut rig = rig();
    for axis in Axis::ALL {
        rig.runner.positions.set(axis, 5);
        rig.runner.targets.set(axis, 10);
    }

    // Normal operation: everything drives forward.
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::High);
    assert_eq!(rig.gantry.y.dir_forward.level(), Level::High);
    assert!(rig.gantry.timer.is_armed());
    fire_timer_if_armed(&rig);

    // Emergency interrupt fires.
    rig.gantry.assert_estop();
    rig.latch.trigger();

    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.runner.supervisor.state(), SupervisorState::Emergency);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);
    assert_eq!(rig.gantry.x.dir_backward.level(), Level::Low);
    assert_eq!(rig.gantry.y.dir_forward.level(), Level::Low);
    assert!(rig.display.contains("EMERGENCY STOP"));
}

#[test]
fn emergency_suppresses_motion_until_confirm_and_clear() {
    let mut rig = rig();
    for axis in Axis::ALL {
        rig.runner.positions.set(axis, 5);
        rig.runner.targets.set(axis, 10);
    }
    rig.runner.step_once(&mut no_ui);
    fire_timer_if_armed(&rig);

    rig.gantry.assert_estop();
    rig.latch.trigger();
    rig.runner.step_once(&mut no_ui);

    // Still in emergency: the coordinator must not re-issue Forward.
    let z_before = rig.runner.positions.get(Axis::Z);
    for _ in 0..5 {
        rig.runner.step_once(&mut no_ui);
    }
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);
    assert!(!rig.gantry.timer.is_armed());
    assert_eq!(rig.runner.positions.get(Axis::Z), z_before);

    // Confirm alone is not enough while the line is still asserted.
    rig.gantry.set_ui_button(true);
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.runner.supervisor.state(), SupervisorState::Emergency);

    // Releasing the line without confirm is not enough either.
    rig.gantry.set_ui_button(false);
    rig.gantry.release_estop();
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.runner.supervisor.state(), SupervisorState::Emergency);

    // Both together recover.
    rig.gantry.set_ui_button(true);
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.runner.supervisor.state(), SupervisorState::Normal);
    assert!(!rig.latch.is_raised());
    rig.gantry.set_ui_button(false);

    // Motion resumes with the unchanged target.
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::High);
    assert_eq!(rig.gantry.y.dir_forward.level(), Level::High);
    assert!(rig.gantry.timer.is_armed());
}

#[test]
fn emergency_reasserts_stop_when_confirm_level_changes() {
    let mut rig = rig();
    rig.runner.targets.set(Axis::X, 10);
    rig.runner.step_once(&mut no_ui);
    fire_timer_if_armed(&rig);

    rig.gantry.assert_estop();
    rig.latch.trigger();
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);

    // A residual command sneaks onto the pins (stuck relay, glitch).
    rig.gantry.x.dir_forward.set_level(Level::High);
    rig.runner.step_once(&mut no_ui);
    // No confirm change: the supervisor only polls recovery.
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::High);

    // Confirm level change re-asserts the stop.
    rig.gantry.set_ui_button(true);
    rig.runner.step_once(&mut no_ui);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);
    assert_eq!(rig.runner.supervisor.state(), SupervisorState::Emergency);
}

// ── Calibration scenario ────────────────────────────────────────────

#[test]
fn calibration_drives_to_start_limits_and_zeroes() {
    let mut gantry = SimulatedGantry::new();
    let positions = AxisPositions::shared();
    let coordinator = coordinator(&gantry, positions.clone());
    coordinator.init();
    let mut targets = TargetPositions::new();

    // Both axes away from home, with stale counters.
    gantry.x.set_position(5);
    gantry.y.set_position(3);
    positions.set(Axis::X, 17);
    positions.set(Axis::Y, -4);
    targets.set(Axis::X, 9);
    targets.set(Axis::Y, 9);

    let mut routine = CalibrationRoutine::new();
    routine.start();

    let mut status = CalibrationStatus::InProgress;
    for _ in 0..200 {
        status = routine.tick(&coordinator, &mut targets);
        if status == CalibrationStatus::Complete {
            break;
        }
        gantry.step();
    }

    assert_eq!(status, CalibrationStatus::Complete);
    assert_eq!(gantry.x.position(), 0);
    assert_eq!(gantry.y.position(), 0);
    assert_eq!(positions.get(Axis::X), 0);
    assert_eq!(positions.get(Axis::Y), 0);
    assert_eq!(targets.get(Axis::X), 0);
    assert_eq!(targets.get(Axis::Y), 0);
    // Both motors left stopped.
    assert_eq!(gantry.x.dir_backward.level(), Level::Low);
    assert_eq!(gantry.y.dir_backward.level(), Level::Low);
}

#[test]
fn calibration_holds_an_axis_already_home() {
    let mut gantry = SimulatedGantry::new();
    let positions = AxisPositions::shared();
    let coordinator = coordinator(&gantry, positions.clone());
    coordinator.init();
    let mut targets = TargetPositions::new();

    gantry.x.set_position(0); // already at the start limit
    gantry.y.set_position(2);

    let mut routine = CalibrationRoutine::new();
    routine.start();
    let status = routine.tick(&coordinator, &mut targets);
    assert_eq!(status, CalibrationStatus::InProgress);
    // X held stopped while Y still seeks.
    assert_eq!(gantry.x.dir_backward.level(), Level::Low);
    assert_eq!(gantry.y.dir_backward.level(), Level::High);

    let mut done = CalibrationStatus::InProgress;
    for _ in 0..100 {
        done = routine.tick(&coordinator, &mut targets);
        if done == CalibrationStatus::Complete {
            break;
        }
        gantry.step();
    }
    assert_eq!(done, CalibrationStatus::Complete);
}

// ── Closed jog loop ─────────────────────────────────────────────────

#[test]
fn dc_axis_follows_target_through_encoder_feedback() {
    let mut rig = rig();
    rig.runner.targets.set(Axis::X, 2);

    for _ in 0..200 {
        rig.runner.step_once(&mut no_ui);
        fire_timer_if_armed(&rig);
        rig.gantry.step();
    }

    assert_eq!(rig.runner.positions.get(Axis::X), 2);
    // Converged: the motor rests.
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);
    assert_eq!(rig.gantry.x.dir_backward.level(), Level::Low);
}

#[test]
fn dc_axis_stalls_at_limit_without_faulting() {
    let mut rig = rig();
    // Target far beyond the travel range.
    rig.runner.targets.set(Axis::X, 500);

    for _ in 0..400 {
        rig.runner.step_once(&mut no_ui);
        fire_timer_if_armed(&rig);
        rig.gantry.step();
    }

    // Mechanically pinned at the end stop, still short of the target,
    // and the driver holds Stop.
    assert_eq!(rig.gantry.x.position(), 100);
    assert!(rig.runner.positions.get(Axis::X) < 500);
    assert_eq!(rig.gantry.x.dir_forward.level(), Level::Low);

    let flags = rig.runner.coordinator.limit_flags();
    assert!(flags.contains(LimitFlags::X_END));
    assert!(!flags.contains(LimitFlags::X_START));
}

// ── Stepper through the control loop ────────────────────────────────

#[test]
fn stepper_axis_reaches_target_one_pulse_per_cycle() {
    let mut rig = rig();
    rig.runner.targets.set(Axis::Z, 3);

    for _ in 0..10 {
        rig.runner.step_once(&mut no_ui);
        fire_timer_if_armed(&rig);
    }

    assert_eq!(rig.runner.positions.get(Axis::Z), 3);
    assert!(!rig.gantry.timer.is_armed());

    // Reversing the target steps back down.
    rig.runner.targets.set(Axis::Z, 1);
    for _ in 0..10 {
        rig.runner.step_once(&mut no_ui);
        fire_timer_if_armed(&rig);
    }
    assert_eq!(rig.runner.positions.get(Axis::Z), 1);
}

#[test]
fn ui_events_reach_the_handler() {
    let mut rig = rig();
    let mut events = Vec::new();
    let mut collect = |event: UiEvent, _targets: &mut TargetPositions| events.push(event);

    // Hold the button past the settle time.
    rig.gantry.set_ui_button(true);
    for _ in 0..3 {
        rig.runner.step_once(&mut collect);
    }
    rig.gantry.set_ui_button(false);
    rig.runner.step_once(&mut collect);

    // One clockwise detent on the UI encoder: B first, then both, release.
    rig.gantry.ui_b.set_level(Level::Low);
    rig.runner.step_once(&mut collect);
    rig.gantry.ui_a.set_level(Level::Low);
    rig.runner.step_once(&mut collect);
    rig.gantry.ui_a.set_level(Level::High);
    rig.gantry.ui_b.set_level(Level::High);
    rig.runner.step_once(&mut collect);

    assert_eq!(events, vec![UiEvent::Pressed, UiEvent::Right]);
}

#[test]
fn motor_command_vocabulary_is_closed() {
    // The drivers accept exactly the three commands; keep the wire values
    // stable for the UI layer.
    assert_eq!(MotorCommand::from_u8(MotorCommand::Stop as u8), Some(MotorCommand::Stop));
    assert_eq!(
        MotorCommand::from_u8(MotorCommand::Forward as u8),
        Some(MotorCommand::Forward)
    );
    assert_eq!(
        MotorCommand::from_u8(MotorCommand::Backward as u8),
        Some(MotorCommand::Backward)
    );
}
