//! `rover-runtime` – the local-navigation control loop.
//!
//! Ties perception, the sector oracle, the planning state machine and the
//! safety interlocks into one fixed-cadence loop.
//!
//! # Modules
//!
//! - [`explorer`] – [`Explorer`][explorer::Explorer]: the sense → plan →
//!   act cycle, its async driver and the background tracker task.
//! - [`selector`] – [`DirectionSelector`][selector::DirectionSelector]:
//!   picks one command from a feasibility map and oracle weights.
//! - [`planner`] – [`PlanningState`][planner::PlanningState]: brake
//!   resolution, jam debounce and command hold bookkeeping.
//! - [`oracle`] – the [`SectorScorer`][oracle::SectorScorer] seam with
//!   [`UniformScorer`][oracle::UniformScorer] and
//!   [`VisitGridScorer`][oracle::VisitGridScorer].
//! - [`trace`] – [`TraceLog`][trace::TraceLog]: per-tick snapshots and
//!   their JSON export.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console or
//!   JSON logs, plus OTLP span export when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//!   set.
//!
//! # Kernel gating
//!
//! Every command the loop decides passes
//! [`CommandGate::admit`][rover_kernel::CommandGate::admit] before it reaches
//! the drive train.  [`CommandGate`] is re-exported so callers can install
//! extra rules without depending on `rover-kernel` directly.

pub mod explorer;
pub mod oracle;
pub mod planner;
pub mod selector;
pub mod telemetry;
pub mod trace;

pub use explorer::{
    Explorer, ExplorerConfig, FALLBACK_TASK_HZ, TickContext, TickReport, spawn_tracker, task_period,
};
pub use oracle::{ScoringGeometry, SectorScorer, UniformScorer, VisitGridScorer};
pub use planner::{Decision, Phase, PlanningState};
pub use selector::{DirectionSelector, Selection, SelectionReason};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use trace::TraceLog;

pub use rover_kernel::CommandGate;
