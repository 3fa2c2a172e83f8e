//! Spatial primitives shared by perception, planning and the HAL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Vehicle pose in the tracker's world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Pose {
    /// Metres.
    pub x: f32,
    /// Metres.
    pub y: f32,
    /// Radians, counter-clockwise from +X.
    pub heading: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }
}

/// One polar range reading in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSample {
    /// Metres, `>= 0`.
    pub distance: f32,
    /// Radians, counter-clockwise from the sensor's forward axis.
    pub angle: f32,
}

impl RangeSample {
    pub const fn new(distance: f32, angle: f32) -> Self {
        Self { distance, angle }
    }
}

/// A cartesian obstacle point in the vehicle frame (x forward, +y left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ObstaclePoint {
    pub x: f32,
    pub y: f32,
}

impl ObstaclePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned body rectangle in the vehicle frame.
///
/// `x` is the rear edge, `y` the right edge, `w` the length along x and `h`
/// the width along y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleFootprint {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl VehicleFootprint {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// X coordinate of the front bumper.
    pub fn front(&self) -> f32 {
        self.x + self.w
    }

    /// X coordinate of the rear bumper.
    pub fn rear(&self) -> f32 {
        self.x
    }

    /// True when `p` lies inside the rectangle shrunk by `inset` on every
    /// side (edges included).
    pub fn contains_inset(&self, p: ObstaclePoint, inset: f32) -> bool {
        self.x + inset <= p.x
            && p.x <= self.x + self.w - inset
            && self.y + inset <= p.y
            && p.y <= self.y + self.h - inset
    }
}

/// Where the range sensor sits on the body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorCalibration {
    /// Body length along x (metres).
    pub body_length: f32,
    /// Body width along y (metres).
    pub body_width: f32,
    /// Distance from the rear bumper to the sensor.
    pub sensor_from_rear: f32,
    /// Distance from the right side to the sensor.
    pub sensor_from_right: f32,
    /// Rotation of the sensor's zero angle relative to the body x axis.
    pub mount_angle: f32,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self {
            body_length: 0.30,
            body_width: 0.18,
            sensor_from_rear: 0.22,
            sensor_from_right: 0.09,
            mount_angle: 0.0,
        }
    }
}

/// Whether a sector can be driven this tick, and how far.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Feasibility {
    pub possible: bool,
    /// Signed: positive ahead, negative behind, `0` when blocked.
    pub clearance: f32,
}

impl Feasibility {
    pub const BLOCKED: Self = Self {
        possible: false,
        clearance: 0.0,
    };

    pub const fn open(clearance: f32) -> Self {
        Self {
            possible: true,
            clearance,
        }
    }

    /// Unsigned clearance used by the selection heuristics.
    pub fn reach(&self) -> f32 {
        self.clearance.abs()
    }
}

/// Aggregated recent motion direction reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DirectionSign {
    Backward,
    #[default]
    Still,
    Forward,
}

impl DirectionSign {
    /// Classify a net displacement; magnitudes within `dead_band` are `Still`.
    pub fn from_displacement(net: f32, dead_band: f32) -> Self {
        if net > dead_band {
            DirectionSign::Forward
        } else if net < -dead_band {
            DirectionSign::Backward
        } else {
            DirectionSign::Still
        }
    }

    /// `-1`, `0` or `+1`.
    pub const fn value(self) -> i8 {
        match self {
            DirectionSign::Backward => -1,
            DirectionSign::Still => 0,
            DirectionSign::Forward => 1,
        }
    }

    /// Inverse of [`DirectionSign::value`]; any positive value is forward.
    pub const fn from_value(value: i8) -> Self {
        if value > 0 {
            DirectionSign::Forward
        } else if value < 0 {
            DirectionSign::Backward
        } else {
            DirectionSign::Still
        }
    }
}
