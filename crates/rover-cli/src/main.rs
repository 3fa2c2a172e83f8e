//! `rover` – headless exploration run against the built-in simulator.
//!
//! This binary wires the whole stack together:
//!
//! 1. Resolves the configuration (`--config`, `~/.rover/config.toml`, or
//!    built-in defaults) and applies `ROVER_*` overrides.
//! 2. Builds the simulated world and starts the physics and motion tracker
//!    tasks.
//! 3. Runs the [`Explorer`] control loop until `--ticks` ticks have run or
//!    Ctrl-C is pressed, then halts the vehicle.
//! 4. Writes the per-tick trace when one was requested and prints a summary.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use rover_hal::sim::Simulator;
use rover_perception::tracker::{DeadReckoner, MotionCell};
use rover_runtime::{Explorer, TraceLog, init_tracing, spawn_tracker, task_period};
use rover_types::{Pose, RoverError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use config::RoverConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Headless exploration run against the built-in simulator.
#[derive(Debug, Parser)]
#[command(name = "rover", version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.rover/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after N control ticks
    #[arg(short = 'n', long, value_name = "N")]
    ticks: Option<u64>,

    /// Record the run and write the trace as JSON
    #[arg(long, value_name = "PATH")]
    trace: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Print the JSON Schema of a trace record and exit
    #[arg(long, conflicts_with = "init_config")]
    trace_schema: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let args = Args::parse();

    if args.trace_schema {
        let schema = TraceLog::schema().and_then(|schema| {
            serde_json::to_string_pretty(&schema)
                .map_err(|e| RoverError::Serialization(e.to_string()))
        });
        return match schema {
            Ok(schema) => {
                println!("{schema}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    if args.init_config {
        return match init_config(args.config) {
            Ok(path) => {
                println!("{} {}", "✓ Wrote default config to".green(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); ROVER_LOG_FORMAT=json switches to
    // JSON lines; OTEL_EXPORTER_OTLP_ENDPOINT adds span export.  The guard
    // flushes spans when main returns.
    let _telemetry = init_tracing("rover");

    print_banner();

    let (mut cfg, source) = match config::resolve(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => return fail(&e),
    };
    if let Some(path) = args.trace {
        cfg.control.trace_path = Some(path);
    }
    match &source {
        Some(path) => println!("  {} {}", "✓ Config loaded from".green(), path.display()),
        None => println!("  {}", "✓ Using built-in defaults".green()),
    }
    println!(
        "  scenario {}  oracle {}  cadence {} Hz",
        format!("{:?}", cfg.sim.scenario).to_lowercase().bold(),
        cfg.control.oracle.to_string().bold(),
        cfg.control.cadence_hz
    );
    println!();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let ctrlc_tx = Arc::clone(&stop_tx);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the vehicle …".yellow().bold());
        let _ = ctrlc_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return fail(&RoverError::Io(e.to_string())),
    };

    match runtime.block_on(explore(cfg, args.ticks, stop_tx, stop_rx)) {
        Ok(summary) => {
            summary.print();
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn fail(e: &RoverError) -> ExitCode {
    eprintln!("{} {e}", "error:".red().bold());
    ExitCode::FAILURE
}

/// Write the default configuration to `path` (or the default location).
/// An existing file is never overwritten.
fn init_config(path: Option<PathBuf>) -> Result<PathBuf, RoverError> {
    let path = path
        .or_else(config::config_path)
        .ok_or_else(|| RoverError::Config("no home directory; pass --config".into()))?;
    if path.exists() {
        return Err(RoverError::Config(format!("{} already exists", path.display())));
    }
    config::save_to(&RoverConfig::default(), &path)?;
    Ok(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

struct RunSummary {
    ticks: u64,
    pose: Pose,
    collisions: u64,
    trace: Option<(PathBuf, usize)>,
}

impl RunSummary {
    fn print(&self) {
        println!();
        println!("{}", "Run complete".bold());
        println!("  ticks       {}", self.ticks);
        println!(
            "  final pose  x {:.2} m  y {:.2} m  heading {:.1}°",
            self.pose.x,
            self.pose.y,
            self.pose.heading.to_degrees()
        );
        if self.collisions == 0 {
            println!("  collisions  {}", "0".green());
        } else {
            println!("  collisions  {}", self.collisions.to_string().red().bold());
        }
        if let Some((path, records)) = &self.trace {
            println!("  trace       {} records → {}", records, path.display());
        }
    }
}

async fn explore(
    cfg: RoverConfig,
    ticks: Option<u64>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
) -> Result<RunSummary, RoverError> {
    let sim = Simulator::with_params(
        cfg.sim.scenario.build(cfg.sim.size),
        cfg.sim.vehicle,
        cfg.sim.calibration,
    );

    let physics = spawn_physics(sim.clone(), cfg.sim.physics_hz, stop_rx.clone());
    let cell = Arc::new(MotionCell::new());
    let tracker = spawn_tracker(
        Box::new(sim.motion_source()),
        DeadReckoner::new(cfg.control.tracker).with_pose(sim.pose()),
        Arc::clone(&cell),
        cfg.control.tracker_hz,
        stop_rx.clone(),
    );

    let mut explorer = Explorer::new(
        cfg.explorer_config(),
        Box::new(sim.range_sensor()),
        cell,
        cfg.scorer(),
        sim.drive_train(),
    )?;

    info!(scenario = ?cfg.sim.scenario, oracle = %cfg.control.oracle, "exploration started");
    let executed = explorer.run(stop_rx, ticks).await;

    let _ = stop_tx.send(true);
    for (name, handle) in [("physics", physics), ("tracker", tracker)] {
        if let Err(e) = handle.await {
            warn!(task = name, error = %e, "background task ended abnormally");
        }
    }

    let trace = match &cfg.control.trace_path {
        Some(path) => {
            explorer.trace().write_json(path)?;
            Some((path.clone(), explorer.trace().len()))
        }
        None => None,
    };

    Ok(RunSummary {
        ticks: executed,
        pose: sim.pose(),
        collisions: sim.collisions(),
        trace,
    })
}

/// Step the simulator at `hz` with the measured elapsed time until `stop`
/// reads `true`.
fn spawn_physics(sim: Simulator, hz: f32, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = task_period(hz);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                now = interval.tick() => {
                    sim.step(now.duration_since(last).as_secs_f32());
                    last = now;
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn print_banner() {
    println!();
    println!("{}", r#"   _______  _  _____ ____ "#.bold().cyan());
    println!("{}", r#"  / __/ _ \| |/ / -_) __/ "#.bold().cyan());
    println!("{}", r#" /_/  \___/|___/\__/_/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "rover".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Local navigation for ground vehicles");
    println!();
}
