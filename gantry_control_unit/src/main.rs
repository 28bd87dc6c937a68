//! # Gantry Control Unit
//!
//! Runs the motion core against the simulation backend from `gantry_hal`:
//! the main thread owns the polling control loop, a background thread
//! stands in for the hardware (simulated mechanics, the stepper timer
//! interrupt pair, and the emergency line edge).
//!
//! After calibration the unit parks both DC axes a small offset away from
//! home and then follows whatever the UI requests.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level as LogLevel, error, info, warn};
use tracing_subscriber::EnvFilter;

use gantry_common::signal::{InputLine, Level, OutputLine};
use gantry_common::timer::StepTimer;
use gantry_common::types::Axis;
use gantry_hal::sim::{SimDisplay, SimulatedGantry};

use gantry_control_unit::config::{MotionConfig, load_config};
use gantry_control_unit::coordinator::MotionCoordinator;
use gantry_control_unit::cycle::{CycleRunner, rt_setup};
use gantry_control_unit::dcmotor::DcMotor;
use gantry_control_unit::emergency::{EmergencyLatch, EmergencySupervisor};
use gantry_control_unit::encoder::{JogEncoder, UiEncoder, UiEvent};
use gantry_control_unit::position::{AxisPositions, TargetPositions};
use gantry_control_unit::stepper::{StepperChannel, StepperDriver};

/// Gantry Control Unit — motion & input control loop
#[derive(Parser, Debug)]
#[command(name = "gantry_control_unit")]
#[command(version)]
#[command(about = "Polling motion control loop for the gantry")]
struct Args {
    /// Path to the motion configuration TOML.
    #[arg(default_value = "config/gantry.toml")]
    config: PathBuf,

    /// CPU core to pin the control thread to (rt builds).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (rt builds).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Skip the blocking X/Y calibration run at startup.
    #[arg(long)]
    skip_calibration: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Gantry Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Gantry Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!(
                "Could not load '{}' ({e}); using built-in defaults",
                args.config.display()
            );
            MotionConfig::default()
        }
    };
    info!(
        "Config OK: cycle_time={}µs, jog_tolerance={}, step_period={}µs",
        config.cycle_time_us, config.jog_tolerance, config.step_period_us
    );

    // RT setup (mlockall, affinity, scheduler); no-ops without `rt`.
    rt_setup(args.cpu_core, args.rt_priority)?;

    let gantry = SimulatedGantry::new();
    let display = SimDisplay::new();
    let (mut runner, latch) = assemble(&config, &gantry, display.clone());

    // Graceful shutdown flag.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // Background hardware stand-in: mechanics, stepper timer interrupt
    // pair, emergency line edge detection.
    let stepper_isr = runner.coordinator.z().isr();
    let sim_running = running.clone();
    let sim_period = Duration::from_micros(u64::from(config.step_period_us));
    let sim_handle = std::thread::spawn(move || {
        let mut gantry = gantry;
        let mut last_estop = gantry.estop_line.level();
        while sim_running.load(Ordering::SeqCst) {
            gantry.step();

            if gantry.timer.is_armed() {
                // Hardware order: compare-match, then overflow.
                stepper_isr.on_compare_match();
                stepper_isr.on_overflow();
            }

            let estop = gantry.estop_line.level();
            if last_estop == Level::High && estop == Level::Low {
                latch.trigger();
            }
            last_estop = estop;

            std::thread::sleep(sim_period);
        }
    });

    if args.skip_calibration {
        warn!("Calibration skipped; position counters are unreferenced");
    } else {
        info!("Calibrating X/Y...");
        runner.calibrate();
    }

    // Park move: a small offset away from the home switches.
    runner.targets.set(Axis::X, 10);
    runner.targets.set(Axis::Y, 10);

    // Minimal stand-in for the menu layer: the encoder jogs the selected
    // axis target, the button cycles the selection.
    let jog_increment = config.jog_increment;
    let mut selected = Axis::X;
    let mut on_ui = move |event: UiEvent, targets: &mut TargetPositions| match event {
        UiEvent::Pressed => {
            selected = match selected {
                Axis::X => Axis::Y,
                Axis::Y => Axis::Z,
                Axis::Z => Axis::X,
            };
            info!("jog axis selected: {selected:?}");
        }
        UiEvent::Left => targets.offset(selected, -jog_increment),
        UiEvent::Right => targets.offset(selected, jog_increment),
    };

    info!("Entering control loop");
    let result = runner.run(&running, &mut on_ui);
    running.store(false, Ordering::SeqCst);
    let _ = sim_handle.join();

    let stats = &runner.stats;
    info!(
        "Cycle stats: {} cycles, avg {}ns, min {}ns, max {}ns, {} overruns",
        stats.cycle_count,
        stats.avg_cycle_ns(),
        stats.min_cycle_ns,
        stats.max_cycle_ns,
        stats.overruns
    );

    result.map_err(Into::into)
}

/// Bind the motion core to the simulated machine.
fn assemble(
    config: &MotionConfig,
    gantry: &SimulatedGantry,
    display: SimDisplay,
) -> (CycleRunner, EmergencyLatch) {
    let positions = AxisPositions::shared();

    let x_motor = DcMotor::new(
        "x",
        OutputLine::active_high(gantry.x.dir_forward.clone()),
        OutputLine::active_high(gantry.x.dir_backward.clone()),
        InputLine::active_low(gantry.x.limit_end.clone()),
        InputLine::active_low(gantry.x.limit_start.clone()),
    );
    let y_motor = DcMotor::new(
        "y",
        OutputLine::active_high(gantry.y.dir_forward.clone()),
        OutputLine::active_high(gantry.y.dir_backward.clone()),
        InputLine::active_low(gantry.y.limit_end.clone()),
        InputLine::active_low(gantry.y.limit_start.clone()),
    );
    let z_stepper = StepperDriver::new(
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
        positions.clone(),
    );

    let coordinator = MotionCoordinator::new(x_motor, y_motor, z_stepper, positions.clone());

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
        config.clone(),
        Box::new(display),
        supervisor,
        coordinator,
        ui,
        jog_x,
        jog_y,
        positions,
    );
    (runner, latch)
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        LogLevel::DEBUG
    } else {
        LogLevel::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
