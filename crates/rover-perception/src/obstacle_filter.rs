//! Obstacle Filter.
//!
//! Turns one batch of polar range samples into the set of vehicle-frame
//! obstacle points the feasibility analysis cares about.  Three kinds of
//! returns are dropped:
//!
//! 1. samples beyond the anisotropic range cutoff, which is slightly longer
//!    toward the sides (the body is wider than the sensor) and, in the front
//!    half-plane, toward the body centre;
//! 2. points inside the two *turn columns*, the discs on either side of the
//!    vehicle that a full-lock turn can never reach, together with the band
//!    beyond each column centre;
//! 3. reflections from the vehicle's own body.
//!
//! The filter is a pure function of its inputs and holds no state between
//! ticks.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::obstacle_filter::ObstacleFilter;
//! use rover_types::{Geometry, RangeSample, VehicleFootprint};
//!
//! let filter = ObstacleFilter::new(
//!     Geometry::default(),
//!     VehicleFootprint::new(-0.22, -0.09, 0.30, 0.18),
//! );
//!
//! let points = filter.filter(&[
//!     RangeSample::new(1.0, 0.0),  // straight ahead: kept
//!     RangeSample::new(5.0, 0.0),  // too far: dropped
//!     RangeSample::new(0.05, 3.1), // own body: dropped
//! ]);
//! assert_eq!(points.len(), 1);
//! ```

use std::f32::consts::FRAC_PI_2;

use rover_types::{Geometry, ObstaclePoint, RangeSample, VehicleFootprint};
use tracing::trace;

use crate::geometry::{distance, fold_angle, polar_to_cartesian};

/// Geometric filter from raw range samples to relevant obstacle points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleFilter {
    geometry: Geometry,
    footprint: VehicleFootprint,
    mount_angle: f32,
}

impl ObstacleFilter {
    pub fn new(geometry: Geometry, footprint: VehicleFootprint) -> Self {
        Self {
            geometry,
            footprint,
            mount_angle: 0.0,
        }
    }

    /// Rotate sensor bearings by `mount_angle` before the cartesian
    /// transform.
    pub fn with_mount_angle(mut self, mount_angle: f32) -> Self {
        self.mount_angle = mount_angle;
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn footprint(&self) -> &VehicleFootprint {
        &self.footprint
    }

    /// Radius to request from the sensor before the per-sample cutoff.
    pub fn prefilter_radius(&self) -> f32 {
        self.geometry.prefilter_radius()
    }

    /// Range cutoff for a sample arriving at `angle` (sensor frame).
    ///
    /// Linear in the folded angle: `check_radius + fear_margin` plus
    /// `half_width` at the sides and `center_offset` straight ahead (the
    /// offset term vanishes over the rear half-plane).
    pub fn range_limit(&self, angle: f32) -> f32 {
        let (folded, rear) = fold_angle(angle);
        let offset = if rear { 0.0 } else { self.geometry.center_offset };
        self.geometry.check_radius
            + self.geometry.fear_margin
            + self.geometry.half_width() * folded
            + offset * (FRAC_PI_2 - folded)
    }

    /// Whether a raw sample survives the range cutoff.
    pub fn accepts(&self, sample: &RangeSample) -> bool {
        sample.distance.is_finite() && sample.distance < self.range_limit(sample.angle)
    }

    /// True when `p` lies in a turn column or the band beyond its centre.
    pub fn in_turn_column(&self, p: ObstaclePoint) -> bool {
        let radius = self.geometry.column_radius();
        let d = self.geometry.turn_diameter;
        if p.y > 0.0 {
            distance(self.geometry.left_column_center(), p) < radius
                || (p.y > d && p.x.abs() < radius)
        } else if p.y < 0.0 {
            distance(self.geometry.right_column_center(), p) < radius
                || (p.y < -d && p.x.abs() < radius)
        } else {
            false
        }
    }

    /// True when `p` is a return from the vehicle's own body.
    pub fn in_body(&self, p: ObstaclePoint) -> bool {
        self.footprint.contains_inset(p, self.geometry.inner_offset)
    }

    /// Run the full filter over one batch of samples.
    ///
    /// An empty batch yields an empty obstacle set.
    pub fn filter(&self, samples: &[RangeSample]) -> Vec<ObstaclePoint> {
        let points: Vec<ObstaclePoint> = samples
            .iter()
            .filter(|s| self.accepts(s))
            .map(|s| polar_to_cartesian(*s, self.mount_angle))
            .filter(|p| !self.in_turn_column(*p) && !self.in_body(*p))
            .collect();
        trace!(raw = samples.len(), kept = points.len(), "obstacle filter");
        points
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn footprint() -> VehicleFootprint {
        VehicleFootprint::new(-0.22, -0.09, 0.30, 0.18)
    }

    fn filter() -> ObstacleFilter {
        ObstacleFilter::new(Geometry::default(), footprint())
    }

    fn sample_at(p: ObstaclePoint) -> RangeSample {
        RangeSample::new(p.x.hypot(p.y), p.y.atan2(p.x))
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(filter().filter(&[]).is_empty());
    }

    #[test]
    fn self_body_returns_are_removed() {
        let f = filter();
        for p in [
            ObstaclePoint::new(0.0, 0.0),
            ObstaclePoint::new(-0.15, 0.05),
            ObstaclePoint::new(0.04, -0.05),
        ] {
            assert!(f.in_body(p), "{p:?} should be inside the body");
            assert!(f.filter(&[sample_at(p)]).is_empty());
        }
    }

    #[test]
    fn body_rim_within_inner_offset_is_kept() {
        let f = filter();
        // 0.01 in front of the shrunk rectangle's front edge (0.05).
        let p = ObstaclePoint::new(0.07, 0.0);
        assert!(!f.in_body(p));
        assert_eq!(f.filter(&[sample_at(p)]).len(), 1);
    }

    #[test]
    fn column_points_are_removed_regardless_of_angle() {
        let f = filter();
        let g = Geometry::default();
        let radius = g.column_radius();
        for i in 0..16 {
            let a = i as f32 * PI / 8.0;
            for center in [g.left_column_center(), g.right_column_center()] {
                let p = ObstaclePoint::new(
                    center.x + 0.9 * radius * a.cos(),
                    center.y + 0.9 * radius * a.sin(),
                );
                assert!(f.in_turn_column(p), "{p:?} at {a}");
                assert!(f.filter(&[sample_at(p)]).is_empty());
            }
        }
    }

    #[test]
    fn band_beyond_column_centre_is_removed() {
        let f = filter();
        assert!(f.in_turn_column(ObstaclePoint::new(0.5, 1.8)));
        assert!(f.in_turn_column(ObstaclePoint::new(-0.5, -1.8)));
        // Same lateral offset but outside the band.
        assert!(!f.in_turn_column(ObstaclePoint::new(0.8, 1.8)));
    }

    #[test]
    fn straight_ahead_and_axis_points_are_not_in_columns() {
        let f = filter();
        assert!(!f.in_turn_column(ObstaclePoint::new(1.0, 0.0)));
        assert!(!f.in_turn_column(ObstaclePoint::new(-1.0, 0.0)));
        assert!(!f.in_turn_column(ObstaclePoint::new(1.0, 0.1)));
    }

    #[test]
    fn range_cutoff_is_linear_in_folded_angle() {
        let f = filter();
        let g = Geometry::default();
        let base = g.check_radius + g.fear_margin;
        assert!((f.range_limit(0.0) - (base + g.center_offset * FRAC_PI_2)).abs() < 1e-5);
        let slope = g.half_width() - g.center_offset;
        for a in [0.1_f32, 0.4, 0.9, 1.3] {
            let expected = f.range_limit(0.0) + slope * a;
            assert!((f.range_limit(a) - expected).abs() < 1e-5, "angle {a}");
            assert!((f.range_limit(-a) - expected).abs() < 1e-5, "angle -{a}");
        }
    }

    #[test]
    fn range_cutoff_shrinks_sideways_when_offset_dominates() {
        let g = Geometry {
            center_offset: 0.12,
            ..Geometry::default()
        };
        let f = ObstacleFilter::new(g, footprint());
        let mut prev = f.range_limit(0.0);
        for i in 1..=10 {
            let a = i as f32 * FRAC_PI_2 / 10.0 - 1e-4;
            let limit = f.range_limit(a);
            assert!(limit <= prev + 1e-6, "limit grew at {a}");
            prev = limit;
        }
    }

    #[test]
    fn rear_half_plane_has_no_offset_term() {
        let f = filter();
        let g = Geometry::default();
        let expected = g.check_radius + g.fear_margin;
        assert!((f.range_limit(PI) - expected).abs() < 1e-5);
        assert!((f.range_limit(-PI) - expected).abs() < 1e-5);
    }

    #[test]
    fn cutoff_rejects_far_samples_before_transform() {
        let f = filter();
        assert!(f.accepts(&RangeSample::new(2.0, 0.0)));
        assert!(!f.accepts(&RangeSample::new(2.2, 0.0)));
        assert!(!f.accepts(&RangeSample::new(2.05, PI)));
        assert!(!f.accepts(&RangeSample::new(f32::NAN, 0.0)));
    }

    #[test]
    fn mount_angle_rotates_points() {
        let f = filter().with_mount_angle(PI);
        let points = f.filter(&[RangeSample::new(1.0, 0.0)]);
        assert_eq!(points.len(), 1);
        assert!((points[0].x + 1.0).abs() < 1e-5);
    }
}
