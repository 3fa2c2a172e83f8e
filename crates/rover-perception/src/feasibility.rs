//! Feasibility Analyzer.
//!
//! For every [`MovementSector`] decides whether the vehicle can drive along
//! it this tick and how far the path stays clear.
//!
//! Each sector first narrows the obstacle set to the points its swept path
//! can touch (a lateral band for straight motion, an annulus around the turn
//! centre for the curved sectors), then scans that candidate set along x:
//!
//! - **forward**: a point between the (slightly inset) front bumper and
//!   `front + stop_distance` blocks the sector; otherwise the nearest point
//!   ahead bounds the clearance, which starts at `front + check_radius`;
//! - **backward**: the mirror image behind the rear bumper, with negative
//!   clearance.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::feasibility::FeasibilityAnalyzer;
//! use rover_types::{Geometry, MovementSector, ObstaclePoint, VehicleFootprint};
//!
//! let analyzer = FeasibilityAnalyzer::new(
//!     Geometry::default(),
//!     VehicleFootprint::new(-0.22, -0.09, 0.30, 0.18),
//! );
//!
//! // A wall 0.2 m in front of the bumper.
//! let map = analyzer.analyze(&[ObstaclePoint::new(0.28, 0.0)], 0.0);
//! assert!(!map[MovementSector::StraightForward].possible);
//! assert!(map[MovementSector::StraightBackward].possible);
//! ```

use rover_types::{
    Feasibility, Geometry, MovementSector, ObstaclePoint, SectorMap, SteeringClass,
    TravelDirection, VehicleFootprint,
};
use tracing::debug;

use crate::geometry::distance;

/// Per-sector feasibility for a fixed vehicle geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilityAnalyzer {
    geometry: Geometry,
    footprint: VehicleFootprint,
}

impl FeasibilityAnalyzer {
    pub fn new(geometry: Geometry, footprint: VehicleFootprint) -> Self {
        Self {
            geometry,
            footprint,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Evaluate all ten sectors against `points` at the given `speed`.
    pub fn analyze(&self, points: &[ObstaclePoint], speed: f32) -> SectorMap<Feasibility> {
        let stop_distance = self.geometry.stop_distance_at(speed);
        let map = SectorMap::from_fn(|sector| self.evaluate(sector, points, stop_distance));
        debug!(
            stop_distance,
            feasible = map.iter().filter(|(_, f)| f.possible).count(),
            "feasibility analysed"
        );
        map
    }

    /// Feasibility of a single sector with an explicit stop distance.
    pub fn evaluate(
        &self,
        sector: MovementSector,
        points: &[ObstaclePoint],
        stop_distance: f32,
    ) -> Feasibility {
        let direction = sector.direction();
        let candidates = points
            .iter()
            .copied()
            .filter(|p| self.on_path(sector, *p));
        match direction {
            TravelDirection::Forward => self.scan_forward(candidates, stop_distance),
            TravelDirection::Backward => self.scan_backward(candidates, stop_distance),
        }
    }

    /// Whether `p` lies in the region swept by `sector`.
    pub fn on_path(&self, sector: MovementSector, p: ObstaclePoint) -> bool {
        let g = &self.geometry;
        match sector.steering() {
            SteeringClass::Straight => {
                let fp = &self.footprint;
                let lateral = fp.y - g.fear_margin <= p.y && p.y <= fp.y + fp.h + g.fear_margin;
                let longitudinal = match sector.direction() {
                    TravelDirection::Forward => {
                        self.forward_min() < p.x && p.x < fp.front() + g.check_radius
                    }
                    TravelDirection::Backward => {
                        fp.rear() - g.check_radius < p.x && p.x < self.backward_max()
                    }
                };
                lateral && longitudinal
            }
            SteeringClass::FullLeft => {
                distance(g.left_column_center(), p) < g.full_turn_outer_radius()
            }
            SteeringClass::FullRight => {
                distance(g.right_column_center(), p) < g.full_turn_outer_radius()
            }
            SteeringClass::SlightLeft => {
                self.on_slight_arc(ObstaclePoint::new(0.0, g.slight_pivot()), p)
            }
            SteeringClass::SlightRight => {
                self.on_slight_arc(ObstaclePoint::new(0.0, -g.slight_pivot()), p)
            }
        }
    }

    fn on_slight_arc(&self, pivot: ObstaclePoint, p: ObstaclePoint) -> bool {
        let g = &self.geometry;
        let radius = g.slight_pivot();
        let margin = g.half_width() + g.fear_margin;
        let d = distance(pivot, p);
        radius - margin < d && d < radius + margin
    }

    fn forward_min(&self) -> f32 {
        self.footprint.front() - self.geometry.inner_offset
    }

    fn backward_max(&self) -> f32 {
        self.footprint.rear() + self.geometry.inner_offset
    }

    fn scan_forward(
        &self,
        candidates: impl Iterator<Item = ObstaclePoint>,
        stop_distance: f32,
    ) -> Feasibility {
        let min = self.forward_min();
        let stop = self.footprint.front() + stop_distance;
        let mut nearest = self.footprint.front() + self.geometry.check_radius;
        for p in candidates.filter(|p| p.x > min) {
            if p.x < stop {
                return Feasibility::BLOCKED;
            }
            nearest = nearest.min(p.x);
        }
        Feasibility::open(nearest)
    }

    fn scan_backward(
        &self,
        candidates: impl Iterator<Item = ObstaclePoint>,
        stop_distance: f32,
    ) -> Feasibility {
        let max = self.backward_max();
        let stop = self.footprint.rear() - stop_distance;
        let mut nearest = self.footprint.rear() - self.geometry.check_radius;
        for p in candidates.filter(|p| p.x < max) {
            if p.x > stop {
                return Feasibility::BLOCKED;
            }
            nearest = nearest.max(p.x);
        }
        Feasibility::open(nearest)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
