//! Planar geometry helpers.
//!
//! Everything here is a pure function of its inputs.  The vehicle frame has
//! its origin at the range sensor, x forward and +y to the left.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::geometry::{Transform2D, distance};
//! use rover_types::{ObstaclePoint, Pose};
//!
//! // Vehicle 1 m along world +X, facing world +Y.
//! let tf = Transform2D::from_pose(Pose::new(1.0, 0.0, std::f32::consts::FRAC_PI_2));
//!
//! // A point 1 m ahead of the vehicle is at (1, 1) in the world.
//! let world = tf.apply(ObstaclePoint::new(1.0, 0.0));
//! assert!(distance(world, ObstaclePoint::new(1.0, 1.0)) < 1e-5);
//! ```

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use rover_types::{ObstaclePoint, Pose, RangeSample, SensorCalibration, VehicleFootprint};

// ────────────────────────────────────────────────────────────────────────────
// Scalar helpers
// ────────────────────────────────────────────────────────────────────────────

/// Euclidean distance between two points.
pub fn distance(a: ObstaclePoint, b: ObstaclePoint) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Wrap an angle into `[-π, π]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps exactly π to -π; keep the positive representative.
    if wrapped == -PI && angle > 0.0 { PI } else { wrapped }
}

/// Fold a sensor angle onto `[0, π/2]` through the rear-hemisphere and
/// left/right symmetries.
///
/// Returns the folded angle and whether the input bearing pointed into
/// the rear half-plane (`[π/2, 3π/2]` after reduction modulo 2π).
pub fn fold_angle(angle: f32) -> (f32, bool) {
    let mut a = angle.rem_euclid(TAU);
    let rear = (FRAC_PI_2..=3.0 * FRAC_PI_2).contains(&a);
    if a >= PI {
        a -= PI;
    }
    if a > FRAC_PI_2 {
        a = PI - a;
    }
    (a.clamp(0.0, FRAC_PI_2), rear)
}

/// Convert a polar sample into the vehicle frame.
///
/// `mount_angle` rotates the sensor's zero bearing onto the body x axis.
pub fn polar_to_cartesian(sample: RangeSample, mount_angle: f32) -> ObstaclePoint {
    let bearing = sample.angle + mount_angle;
    ObstaclePoint::new(sample.distance * bearing.cos(), sample.distance * bearing.sin())
}

/// Body rectangle, expressed relative to the sensor, for a calibration.
pub fn calibration_to_footprint(calibration: &SensorCalibration) -> VehicleFootprint {
    VehicleFootprint::new(
        -calibration.sensor_from_rear,
        -calibration.sensor_from_right,
        calibration.body_length,
        calibration.body_width,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Transform2D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid planar transform: rotate by `rotation`, then translate.
///
/// Represents the pose of frame B in frame A: applying it to a point
/// expressed in B yields the same point expressed in A.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub tx: f32,
    pub ty: f32,
    pub rotation: f32,
}

impl Transform2D {
    pub fn new(tx: f32, ty: f32, rotation: f32) -> Self {
        Self { tx, ty, rotation }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Vehicle-to-world transform for a tracked pose.
    pub fn from_pose(pose: Pose) -> Self {
        Self::new(pose.x, pose.y, pose.heading)
    }

    pub fn apply(&self, p: ObstaclePoint) -> ObstaclePoint {
        let (sin, cos) = self.rotation.sin_cos();
        ObstaclePoint::new(
            self.tx + cos * p.x - sin * p.y,
            self.ty + sin * p.x + cos * p.y,
        )
    }

    /// Compose two transforms: if `self` = T_A_B and `other` = T_B_C the
    /// result is T_A_C.
    pub fn compose(&self, other: &Self) -> Self {
        let origin = self.apply(ObstaclePoint::new(other.tx, other.ty));
        Self::new(
            origin.x,
            origin.y,
            normalize_angle(self.rotation + other.rotation),
        )
    }

    /// T_B_A for T_A_B.
    pub fn inverse(&self) -> Self {
        let (sin, cos) = self.rotation.sin_cos();
        Self::new(
            -(cos * self.tx + sin * self.ty),
            sin * self.tx - cos * self.ty,
            -self.rotation,
        )
    }
}

/// Express a vehicle-frame point in world coordinates.
pub fn to_world(pose: Pose, p: ObstaclePoint) -> ObstaclePoint {
    Transform2D::from_pose(pose).apply(p)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
