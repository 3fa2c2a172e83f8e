//! `rover-types` – shared vocabulary of the rover navigation stack.
//!
//! # Modules
//!
//! - [`sector`] – the ten [`MovementSector`]s and the exhaustive
//!   [`SectorMap`] container.
//! - [`command`] – canonical [`DirectionCommand`]s built from
//!   [`SteeringClass`] and [`Throttle`].
//! - [`spatial`] – poses, range samples, obstacle points, the vehicle
//!   footprint and per-sector [`Feasibility`].
//! - [`geometry`] – [`Geometry`] constants and [`PlannerTuning`].

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod command;
pub mod geometry;
pub mod sector;
pub mod spatial;

pub use command::{DirectionCommand, Throttle};
pub use geometry::{Geometry, PlannerTuning};
pub use sector::{MovementSector, SectorMap, SteeringClass, TravelDirection};
pub use spatial::{
    DirectionSign, Feasibility, ObstaclePoint, Pose, RangeSample, SensorCalibration,
    VehicleFootprint,
};

/// One control-loop tick as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TickSnapshot {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    /// Speed read from the tracker (m/s).
    pub speed: f32,
    pub pose: Pose,
    /// Unfiltered vehicle-frame point cloud seen this tick.
    pub points: Vec<ObstaclePoint>,
    /// Tracked net motion sign: `-1`, `0` or `1`.
    pub direction: i8,
    /// Command applied during this tick.
    pub command: DirectionCommand,
}

/// Error type spanning sensor, oracle, actuator and configuration failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Range sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Sector oracle failed: {0}")]
    OracleFailed(String),

    #[error("Actuator fault on {channel}: {details}")]
    ActuatorFault { channel: String, details: String },

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Command rejected by {rule}: {details}")]
    CommandRejected { rule: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RoverError {
    fn from(e: std::io::Error) -> Self {
        RoverError::Io(e.to_string())
    }
}
