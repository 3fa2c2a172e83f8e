//! `rover-perception` – from raw sensor data to what the planner reasons
//! about.
//!
//! # Modules
//!
//! - [`geometry`] – planar transforms and the angle/polar helpers shared by
//!   the rest of the stack.
//! - [`obstacle_filter`] – [`ObstacleFilter`][obstacle_filter::ObstacleFilter]:
//!   range cutoff, turn-column and self-body exclusion.
//! - [`feasibility`] – [`FeasibilityAnalyzer`][feasibility::FeasibilityAnalyzer]:
//!   per-sector go/no-go plus clearance.
//! - [`tracker`] – [`DeadReckoner`][tracker::DeadReckoner] complementary
//!   filter and the lock-free [`MotionCell`][tracker::MotionCell] it
//!   publishes into.

pub mod feasibility;
pub mod geometry;
pub mod obstacle_filter;
pub mod tracker;

pub use feasibility::FeasibilityAnalyzer;
pub use obstacle_filter::ObstacleFilter;
pub use tracker::{MotionCell, MotionTracker};
