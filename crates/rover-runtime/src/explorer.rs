//! [`Explorer`] – the fixed-cadence sense → plan → act loop.
//!
//! Each tick:
//!
//! 1. **Sense** – read pose, speed and net direction from the
//!    [`MotionTracker`].
//! 2. **Reflex** – if the active command's hold has run out, let the
//!    [`PlanningState`] resolve brakes and jams without perception.
//! 3. **Plan** – otherwise scan the [`RangeSensor`], run the
//!    [`ObstacleFilter`] and [`FeasibilityAnalyzer`], and ask the
//!    [`DirectionSelector`] (which consults the [`SectorScorer`]) for a
//!    command.
//! 4. **Gatekeep** – the decided command passes the [`CommandGate`]; a
//!    rejection is replaced by the stop command.
//! 5. **Act** – the active command is written to the [`DriveTrain`].
//!
//! The oracle and the actuators each sit behind a [`CircuitBreaker`].  A
//! failed or slow oracle call stops the vehicle for that tick; a failed
//! actuator write triggers one attempt to apply the stop command.  The loop
//! itself never returns an error.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rover_hal::sim::{SimWorld, Simulator};
//! use rover_perception::MotionCell;
//! use rover_runtime::explorer::{Explorer, ExplorerConfig};
//! use rover_runtime::oracle::UniformScorer;
//! use rover_types::DirectionCommand;
//!
//! let sim = Simulator::new(SimWorld::empty());
//! let mut explorer = Explorer::new(
//!     ExplorerConfig::default(),
//!     Box::new(sim.range_sensor()),
//!     Arc::new(MotionCell::new()),
//!     Box::new(UniformScorer::default()),
//!     sim.drive_train(),
//! )
//! .unwrap();
//!
//! // Nothing around and nothing preferred: straight ahead.
//! assert_eq!(explorer.tick().command, DirectionCommand::FULL_FORWARD);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rover_hal::{DriveTrain, MotionSource, RangeSensor};
use rover_kernel::{BreakerConfig, CircuitBreaker, CommandGate, CommandProposal};
use rover_perception::tracker::{DeadReckoner, MotionCell};
use rover_perception::{FeasibilityAnalyzer, MotionTracker, ObstacleFilter};
use rover_types::{
    DirectionCommand, DirectionSign, Feasibility, Geometry, ObstaclePoint, PlannerTuning, Pose,
    RoverError, SectorMap, TickSnapshot,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn};

use crate::oracle::{ScoringGeometry, SectorScorer};
use crate::planner::{Decision, Phase, PlanningState};
use crate::selector::DirectionSelector;
use crate::trace::TraceLog;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`Explorer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub geometry: Geometry,
    pub tuning: PlannerTuning,
    /// Control loop rate.
    pub cadence_hz: f32,
    pub oracle_breaker: BreakerConfig,
    pub actuator_breaker: BreakerConfig,
    /// Keep a [`TickSnapshot`] per tick.
    pub record_trace: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            tuning: PlannerTuning::default(),
            cadence_hz: 4.0,
            oracle_breaker: BreakerConfig::default(),
            actuator_breaker: BreakerConfig::default(),
            record_trace: false,
        }
    }
}

impl ExplorerConfig {
    /// Tick period derived from `cadence_hz`.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.cadence_hz)
    }

    /// # Errors
    ///
    /// [`RoverError::Config`] for an unusable cadence, geometry or tuning.
    pub fn validate(&self) -> Result<(), RoverError> {
        if !(self.cadence_hz.is_finite() && self.cadence_hz > 0.0 && self.cadence_hz <= 1000.0) {
            return Err(RoverError::Config(format!(
                "cadence_hz must be in (0, 1000], got {}",
                self.cadence_hz
            )));
        }
        self.geometry.validate()?;
        self.tuning.validate()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-tick values
// ─────────────────────────────────────────────────────────────────────────────

/// Values computed once per tick and shared by the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickContext {
    pub speed: f32,
    pub pose: Pose,
    pub direction: DirectionSign,
    /// Full scan in the vehicle frame, unfiltered.  Empty on ticks without
    /// a selection pass.
    pub raw_points: Vec<ObstaclePoint>,
    /// Obstacles that survived the filter.
    pub obstacles: Vec<ObstaclePoint>,
    /// Present when a selection pass ran this tick.
    pub feasibility: Option<SectorMap<Feasibility>>,
}

/// What one call to [`Explorer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Command active after the tick (what the actuators were given, or the
    /// stop command after a fault).
    pub command: DirectionCommand,
    pub phase: Phase,
    /// `true` when a new decision was taken this tick.
    pub decided: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Explorer
// ─────────────────────────────────────────────────────────────────────────────

/// The control loop.  Owns the planning state and every collaborator it
/// calls synchronously.
pub struct Explorer {
    config: ExplorerConfig,
    sensor: Box<dyn RangeSensor>,
    tracker: Arc<dyn MotionTracker>,
    scorer: Box<dyn SectorScorer>,
    drive: DriveTrain,
    filter: ObstacleFilter,
    analyzer: FeasibilityAnalyzer,
    selector: DirectionSelector,
    scoring: ScoringGeometry,
    gate: CommandGate,
    oracle_breaker: CircuitBreaker,
    actuator_breaker: CircuitBreaker,
    state: PlanningState,
    context: TickContext,
    trace: TraceLog,
    ticks: u64,
}

impl Explorer {
    /// Wire the loop.  The vehicle footprint and mount angle come from the
    /// sensor's calibration.
    ///
    /// # Errors
    ///
    /// [`RoverError::Config`] if the configuration does not validate.
    pub fn new(
        config: ExplorerConfig,
        sensor: Box<dyn RangeSensor>,
        tracker: Arc<dyn MotionTracker>,
        scorer: Box<dyn SectorScorer>,
        drive: DriveTrain,
    ) -> Result<Self, RoverError> {
        config.validate()?;

        let footprint = sensor.footprint();
        let mount_angle = sensor.calibration().mount_angle;
        let filter = ObstacleFilter::new(config.geometry, footprint).with_mount_angle(mount_angle);
        let analyzer = FeasibilityAnalyzer::new(config.geometry, footprint);

        Ok(Self {
            selector: DirectionSelector::new(config.tuning),
            scoring: ScoringGeometry::from_geometry(&config.geometry),
            gate: CommandGate::with_default_rules(),
            oracle_breaker: CircuitBreaker::new("oracle", config.oracle_breaker),
            actuator_breaker: CircuitBreaker::new("actuators", config.actuator_breaker),
            state: PlanningState::new(),
            context: TickContext::default(),
            trace: TraceLog::new(),
            ticks: 0,
            config,
            sensor,
            tracker,
            scorer,
            drive,
            filter,
            analyzer,
        })
    }

    /// Replace the default command gate.
    pub fn with_gate(mut self, gate: CommandGate) -> Self {
        self.gate = gate;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn state(&self) -> &PlanningState {
        &self.state
    }

    /// Context of the most recent tick.
    pub fn context(&self) -> &TickContext {
        &self.context
    }

    pub fn drive_train(&self) -> &DriveTrain {
        &self.drive
    }

    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Hand the recorded trace over, starting a fresh one.
    pub fn take_trace(&mut self) -> TraceLog {
        std::mem::take(&mut self.trace)
    }

    /// Ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run one control cycle.
    pub fn tick(&mut self) -> TickReport {
        let n = self.ticks;
        let span = info_span!("tick", n);
        let _entered = span.enter();

        let motion = self.tracker.estimate();
        let mut ctx = TickContext {
            speed: motion.speed,
            pose: motion.pose,
            direction: motion.direction,
            ..TickContext::default()
        };

        let previous = self.state.active();
        let decided = self.state.needs_decision();
        if decided {
            let decision = match self.state.reflex(ctx.direction, &self.config.tuning) {
                Some(decision) => decision,
                None => self.select(previous, &mut ctx),
            };
            debug!(
                command = %decision.command,
                phase = %decision.phase,
                keep_for = decision.keep_for,
                "decision"
            );

            let proposal = CommandProposal {
                command: decision.command,
                previous,
                feasibility: ctx.feasibility.as_ref(),
            };
            let admitted = self.gate.admit(&proposal);
            if admitted == decision.command {
                self.state.commit(decision);
            } else {
                self.state.force(admitted);
            }
        }

        self.actuate(self.state.active());
        self.state.advance(previous);

        if self.config.record_trace {
            self.trace.push(TickSnapshot {
                tick: n,
                timestamp: Utc::now(),
                speed: ctx.speed,
                pose: ctx.pose,
                points: ctx.raw_points.clone(),
                direction: ctx.direction.value(),
                command: self.state.active(),
            });
        }
        self.context = ctx;
        self.ticks += 1;

        TickReport {
            tick: n,
            command: self.state.active(),
            phase: self.state.phase(),
            decided,
        }
    }

    /// Perception and selection.  Any failure yields the stop decision.
    fn select(&mut self, previous: DirectionCommand, ctx: &mut TickContext) -> Decision {
        let samples = match self.sensor.points_within(self.filter.prefilter_radius(), false) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(error = %e, "range sensor unavailable, stopping");
                return Decision::stop();
            }
        };
        let full_scan = self.sensor.cached_points();
        ctx.raw_points = self.sensor.to_cartesian(&full_scan);
        ctx.obstacles = self.filter.filter(&samples);
        let feasibility = self.analyzer.analyze(&ctx.obstacles, ctx.speed);
        self.scorer.observe(ctx.pose, &full_scan);

        let scorer = &self.scorer;
        let breaker = &mut self.oracle_breaker;
        let (pose, scoring) = (ctx.pose, self.scoring);
        let selection = self.selector.select(&feasibility, previous, || {
            breaker.call(|| scorer.score_sectors(pose, &scoring))
        });
        ctx.feasibility = Some(feasibility);

        match selection {
            Ok(selection) => Decision::selected(selection.command),
            Err(e) => {
                warn!(error = %e, "oracle unavailable, stopping");
                Decision::stop()
            }
        }
    }

    /// Write `command` to the drive train.  On failure one attempt is made
    /// to stop and the stop command becomes active.
    fn actuate(&mut self, command: DirectionCommand) {
        let drive = &mut self.drive;
        let Err(e) = self.actuator_breaker.call(|| drive.apply(&command)) else {
            return;
        };
        match &e {
            RoverError::CircuitOpen(_) => {
                warn!(error = %e, %command, "actuators skipped, stopping")
            }
            _ => error!(error = %e, %command, "actuator fault, stopping"),
        }
        if let Err(stop_error) = self.drive.stop() {
            error!(error = %stop_error, "stop command failed");
        }
        self.state.force(DirectionCommand::STOP);
    }

    /// Apply the stop command and reset the planner.
    pub fn halt(&mut self) {
        if let Err(e) = self.drive.stop() {
            error!(error = %e, "stop command failed during halt");
        }
        self.state.force(DirectionCommand::STOP);
    }

    // -------------------------------------------------------------------------
    // Async loop
    // -------------------------------------------------------------------------

    /// Tick at `cadence_hz` until `stop` reads `true` (or its sender is
    /// dropped) or `max_ticks` ticks have run, then halt the vehicle.
    ///
    /// Returns the number of ticks executed by this call.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>, max_ticks: Option<u64>) -> u64 {
        let mut interval = tokio::time::interval(self.config.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let first = self.ticks;
        info!(
            run_id = %self.trace.run_id(),
            cadence_hz = self.config.cadence_hz,
            "control loop started"
        );

        loop {
            if *stop.borrow() {
                break;
            }
            if max_ticks.is_some_and(|max| self.ticks - first >= max) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        warn!("stop channel closed");
                        break;
                    }
                }
            }
        }

        self.halt();
        let executed = self.ticks - first;
        info!(ticks = executed, "control loop stopped");
        executed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker task
// ─────────────────────────────────────────────────────────────────────────────

/// Rate used by background tasks handed an unusable rate.
pub const FALLBACK_TASK_HZ: f32 = 50.0;

/// Period of a background task running at `hz`, clamped to 1..=1000 Hz.
/// A non-finite or non-positive rate falls back to [`FALLBACK_TASK_HZ`].
pub fn task_period(hz: f32) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 {
        hz.clamp(1.0, 1000.0)
    } else {
        warn!(hz, fallback = FALLBACK_TASK_HZ, "unusable task rate");
        FALLBACK_TASK_HZ
    };
    Duration::from_secs_f32(1.0 / hz)
}

/// Run the dead-reckoning tracker at `hz` in the background, publishing
/// every estimate into `cell`, until `stop` reads `true`.
pub fn spawn_tracker(
    mut source: Box<dyn MotionSource>,
    mut reckoner: DeadReckoner,
    cell: Arc<MotionCell>,
    hz: f32,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
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
                    let dt = now.duration_since(last).as_secs_f32();
                    last = now;
                    match source.odometry() {
                        Ok(odometry) => cell.publish(reckoner.update(odometry, source.imu(), dt)),
                        Err(e) => warn!(error = %e, "odometry unavailable"),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(updates = cell.updates(), "tracker stopped");
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
