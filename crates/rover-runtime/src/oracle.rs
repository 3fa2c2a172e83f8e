//! Spatial weighting oracle: per-sector preference weights.
//!
//! The planner asks a [`SectorScorer`] how attractive each of the ten
//! sectors is from the current pose.  Feasibility is applied afterwards by
//! the selector, so a scorer only expresses preference, never safety.
//!
//! Two in-process scorers ship with the crate:
//! - [`UniformScorer`] – the same weight everywhere; the selector's
//!   clearance and continuity heuristics decide alone.
//! - [`VisitGridScorer`] – counts how often the vehicle has been in each
//!   cell of a coarse grid and favours sectors leading to rarely visited
//!   cells.
//!
//! # Example
//!
//! ```
//! use rover_runtime::oracle::{ScoringGeometry, SectorScorer, VisitGridScorer};
//! use rover_types::{MovementSector, Pose};
//!
//! let mut scorer = VisitGridScorer::new(0.5, 1.2);
//! let here = Pose::new(0.0, 0.0, 0.0);
//! let geometry = ScoringGeometry { to_body_center_offset: 0.0, turn_radius: 0.44 };
//!
//! // Sit one look-ahead in front of the start for a while.
//! for _ in 0..3 {
//!     scorer.observe(Pose::new(1.2, 0.0, 0.0), &[]);
//! }
//! let weights = scorer.score_sectors(here, &geometry).unwrap();
//! assert!(weights[MovementSector::StraightForward] < weights[MovementSector::StraightBackward]);
//! ```

use std::collections::HashMap;

use rover_types::{Geometry, MovementSector, Pose, RangeSample, RoverError, SectorMap};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Vehicle parameters the oracle needs to project sector paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringGeometry {
    /// Distance from the pose origin (range sensor) to the body centre,
    /// along the heading.
    pub to_body_center_offset: f32,
    /// Radius of a full-lock turn.
    pub turn_radius: f32,
}

impl ScoringGeometry {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        Self {
            to_body_center_offset: geometry.center_offset,
            turn_radius: geometry.turn_diameter / 2.0,
        }
    }
}

/// Source of per-sector preference weights.
pub trait SectorScorer: Send {
    /// Weights for every sector seen from `pose`.  Non-negative values are
    /// expected; the selector treats anything else as `0`.
    ///
    /// # Errors
    ///
    /// [`RoverError::OracleFailed`] when no weights can be produced.
    fn score_sectors(
        &self,
        pose: Pose,
        geometry: &ScoringGeometry,
    ) -> Result<SectorMap<f32>, RoverError>;

    /// Fed with the pose and the full scan on every selection pass.
    fn observe(&mut self, _pose: Pose, _samples: &[RangeSample]) {}
}

// ────────────────────────────────────────────────────────────────────────────
// UniformScorer
// ────────────────────────────────────────────────────────────────────────────

/// Returns the same weight for every sector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformScorer {
    weight: f32,
}

impl UniformScorer {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Default for UniformScorer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SectorScorer for UniformScorer {
    fn score_sectors(
        &self,
        _pose: Pose,
        _geometry: &ScoringGeometry,
    ) -> Result<SectorMap<f32>, RoverError> {
        Ok(SectorMap::splat(self.weight))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VisitGridScorer
// ────────────────────────────────────────────────────────────────────────────

type Cell = (i32, i32);

/// Exploration scorer over a sparse visit-count grid.
///
/// Every [`observe`][SectorScorer::observe] increments the count of the
/// cell holding the vehicle.  A sector is scored by following its arc for
/// `look_ahead` metres from the body centre; the weight is
/// `1 / (1 + visits)` of the cell it ends in.
#[derive(Debug, Clone)]
pub struct VisitGridScorer {
    cell_size: f32,
    look_ahead: f32,
    visits: HashMap<Cell, u32>,
}

impl VisitGridScorer {
    /// `cell_size` and `look_ahead` are in metres.
    pub fn new(cell_size: f32, look_ahead: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            look_ahead,
            visits: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f32, y: f32) -> Cell {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Visit count of the cell containing world point `(x, y)`.
    pub fn visits_at(&self, x: f32, y: f32) -> u32 {
        self.visits.get(&self.cell_of(x, y)).copied().unwrap_or(0)
    }

    /// Number of cells visited at least once.
    pub fn visited_cells(&self) -> usize {
        self.visits.len()
    }

    /// End point of `sector`'s arc, in world coordinates.
    pub fn project(
        &self,
        pose: Pose,
        sector: MovementSector,
        geometry: &ScoringGeometry,
    ) -> (f32, f32) {
        let (sin, cos) = pose.heading.sin_cos();
        let x = pose.x + geometry.to_body_center_offset * cos;
        let y = pose.y + geometry.to_body_center_offset * sin;

        let travel = self.look_ahead * sector.direction().sign();
        // Negative steering turns left, i.e. counter-clockwise.
        let curvature = if geometry.turn_radius > 0.0 {
            -sector.steering().value() / geometry.turn_radius
        } else {
            0.0
        };
        if curvature.abs() < 1e-6 {
            return (x + travel * cos, y + travel * sin);
        }
        let heading = pose.heading + curvature * travel;
        (
            x + (heading.sin() - sin) / curvature,
            y - (heading.cos() - cos) / curvature,
        )
    }
}

impl Default for VisitGridScorer {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}

impl SectorScorer for VisitGridScorer {
    fn score_sectors(
        &self,
        pose: Pose,
        geometry: &ScoringGeometry,
    ) -> Result<SectorMap<f32>, RoverError> {
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.heading.is_finite()) {
            return Err(RoverError::OracleFailed(format!("non-finite pose {pose:?}")));
        }
        Ok(SectorMap::from_fn(|sector| {
            let (x, y) = self.project(pose, sector, geometry);
            1.0 / (1.0 + self.visits_at(x, y) as f32)
        }))
    }

    fn observe(&mut self, pose: Pose, _samples: &[RangeSample]) {
        let cell = self.cell_of(pose.x, pose.y);
        let count = self.visits.entry(cell).or_insert(0);
        *count = count.saturating_add(1);
        trace!(cell = ?cell, visits = *count, "visit grid updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ScoringGeometry {
        ScoringGeometry {
            to_body_center_offset: 0.0,
            turn_radius: 0.44,
        }
    }

    #[test]
    fn scoring_geometry_from_vehicle_geometry() {
        let g = ScoringGeometry::from_geometry(&Geometry::default());
        assert!((g.to_body_center_offset - 0.07).abs() < 1e-6);
        assert!((g.turn_radius - 0.44).abs() < 1e-6);
    }

    #[test]
    fn uniform_scorer_is_flat() {
        let weights = UniformScorer::new(2.0)
            .score_sectors(Pose::default(), &geometry())
            .unwrap();
        assert!(weights.iter().all(|(_, w)| *w == 2.0));
    }

    #[test]
    fn fresh_grid_scores_everything_one() {
        let weights = VisitGridScorer::default()
            .score_sectors(Pose::default(), &geometry())
            .unwrap();
        assert!(weights.iter().all(|(_, w)| *w == 1.0));
    }

    #[test]
    fn straight_projection_follows_heading() {
        let scorer = VisitGridScorer::new(0.5, 1.0);
        let pose = Pose::new(1.0, 1.0, std::f32::consts::FRAC_PI_2);
        let (x, y) = scorer.project(pose, MovementSector::StraightForward, &geometry());
        assert!((x - 1.0).abs() < 1e-5);
        assert!((y - 2.0).abs() < 1e-5);
        let (x, y) = scorer.project(pose, MovementSector::StraightBackward, &geometry());
        assert!((x - 1.0).abs() < 1e-5);
        assert!(y.abs() < 1e-5);
    }

    #[test]
    fn left_turns_bend_towards_positive_y() {
        let scorer = VisitGridScorer::new(0.5, 0.5);
        let (_, y) = scorer.project(Pose::default(), MovementSector::FullLeftForward, &geometry());
        assert!(y > 0.0);
        let (_, y) = scorer.project(Pose::default(), MovementSector::FullRightForward, &geometry());
        assert!(y < 0.0);
        // Reversing with left lock swings the body to +y as well.
        let (x, y) = scorer.project(Pose::default(), MovementSector::FullLeftBackward, &geometry());
        assert!(x < 0.0 && y > 0.0);
    }

    #[test]
    fn projection_stays_on_turn_circle() {
        let scorer = VisitGridScorer::new(0.5, 1.0);
        let g = geometry();
        let (x, y) = scorer.project(Pose::default(), MovementSector::FullLeftForward, &g);
        // Centre of the full-left circle is (0, turn_radius).
        let r = (x * x + (y - g.turn_radius).powi(2)).sqrt();
        assert!((r - g.turn_radius).abs() < 1e-4);
    }

    #[test]
    fn visited_cells_lose_weight() {
        let mut scorer = VisitGridScorer::new(0.5, 1.2);
        for _ in 0..3 {
            scorer.observe(Pose::new(1.1, 0.1, 0.0), &[]);
        }
        assert_eq!(scorer.visited_cells(), 1);
        let weights = scorer.score_sectors(Pose::default(), &geometry()).unwrap();
        assert!((weights[MovementSector::StraightForward] - 0.25).abs() < 1e-6);
        assert_eq!(weights[MovementSector::StraightBackward], 1.0);
    }

    #[test]
    fn non_finite_pose_fails() {
        let scorer = VisitGridScorer::default();
        let err = scorer
            .score_sectors(Pose::new(f32::NAN, 0.0, 0.0), &geometry())
            .unwrap_err();
        assert!(matches!(err, RoverError::OracleFailed(_)));
    }
}
