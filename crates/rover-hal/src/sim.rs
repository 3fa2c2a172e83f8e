//! In-process vehicle simulator for headless runs and tests.
//!
//! [`Simulator`] owns a [`SimWorld`] of circular and segment obstacles and a
//! kinematic car model.  It hands out driver objects that all share the same
//! state behind an `Arc<Mutex<_>>`:
//!
//! | Handle | Implements | Behaviour |
//! |---|---|---|
//! | [`SimRangeSensor`] | [`RangeSensor`] | 360-beam ray-cast scan from the sensor origin. |
//! | [`SimMotionSource`] | [`MotionSource`] | Ideal odometry and gyro yaw rate. |
//! | [`SimChannel`] | [`Actuator`] | Writes the steering or throttle input of the model. |
//!
//! The model is advanced explicitly with [`Simulator::step`].  Like a hobby
//! ESC, a throttle opposing the last motion brakes toward standstill and
//! holds there; reversing needs a neutral throttle first.  A step that would
//! put an obstacle inside the body is cancelled and the vehicle stops dead.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{SimWorld, Simulator};
//! use rover_types::DirectionCommand;
//!
//! let sim = Simulator::new(SimWorld::empty());
//! let mut drive = sim.drive_train();
//! drive.apply(&DirectionCommand::FULL_FORWARD).unwrap();
//!
//! for _ in 0..50 {
//!     sim.step(0.02);
//! }
//! assert!(sim.pose().x > 0.1);
//! ```

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rover_perception::geometry::{Transform2D, calibration_to_footprint, normalize_angle};
use rover_perception::tracker::{ImuSample, OdometrySample};
use rover_types::{
    ObstaclePoint, Pose, RangeSample, RoverError, SensorCalibration, VehicleFootprint,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::actuator::Actuator;
use crate::drivetrain::{DriveTrain, STEERING, THROTTLE};
use crate::sensor::{MotionSource, RangeSensor};

const EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// World
// ────────────────────────────────────────────────────────────────────────────

/// A static obstacle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obstacle {
    Circle { center: ObstaclePoint, radius: f32 },
    Segment { a: ObstaclePoint, b: ObstaclePoint },
}

impl Obstacle {
    /// Distance along a unit-direction ray to the first hit.
    fn ray_hit(&self, origin: ObstaclePoint, dir: ObstaclePoint) -> Option<f32> {
        match *self {
            Obstacle::Circle { center, radius } => {
                let fx = origin.x - center.x;
                let fy = origin.y - center.y;
                let b = fx * dir.x + fy * dir.y;
                let c = fx * fx + fy * fy - radius * radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                [-b - root, -b + root].into_iter().find(|t| *t >= 0.0)
            }
            Obstacle::Segment { a, b } => {
                let e = sub(b, a);
                let denom = cross(dir, e);
                if denom.abs() < EPSILON {
                    return None;
                }
                let w = sub(a, origin);
                let t = cross(w, e) / denom;
                let u = cross(w, dir) / denom;
                (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
            }
        }
    }

    /// Whether the obstacle overlaps `rect`, both given in the same frame.
    fn overlaps(&self, rect: &VehicleFootprint) -> bool {
        match *self {
            Obstacle::Circle { center, radius } => {
                let cx = center.x.clamp(rect.x, rect.x + rect.w);
                let cy = center.y.clamp(rect.y, rect.y + rect.h);
                (center.x - cx).hypot(center.y - cy) < radius
            }
            Obstacle::Segment { a, b } => {
                if rect.contains_inset(a, 0.0) || rect.contains_inset(b, 0.0) {
                    return true;
                }
                let corners = [
                    ObstaclePoint::new(rect.x, rect.y),
                    ObstaclePoint::new(rect.x + rect.w, rect.y),
                    ObstaclePoint::new(rect.x + rect.w, rect.y + rect.h),
                    ObstaclePoint::new(rect.x, rect.y + rect.h),
                ];
                (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
            }
        }
    }

    fn to_frame(&self, tf: &Transform2D) -> Self {
        match *self {
            Obstacle::Circle { center, radius } => Obstacle::Circle {
                center: tf.apply(center),
                radius,
            },
            Obstacle::Segment { a, b } => Obstacle::Segment {
                a: tf.apply(a),
                b: tf.apply(b),
            },
        }
    }
}

fn sub(a: ObstaclePoint, b: ObstaclePoint) -> ObstaclePoint {
    ObstaclePoint::new(a.x - b.x, a.y - b.y)
}

fn cross(a: ObstaclePoint, b: ObstaclePoint) -> f32 {
    a.x * b.y - a.y * b.x
}

fn segments_intersect(
    p1: ObstaclePoint,
    p2: ObstaclePoint,
    q1: ObstaclePoint,
    q2: ObstaclePoint,
) -> bool {
    let r = sub(p2, p1);
    let s = sub(q2, q1);
    let denom = cross(r, s);
    if denom.abs() < EPSILON {
        return false;
    }
    let w = sub(q1, p1);
    let t = cross(w, s) / denom;
    let u = cross(w, r) / denom;
    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// Collection of static obstacles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimWorld {
    obstacles: Vec<Obstacle>,
}

impl SimWorld {
    /// A world with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Square room of side `size` centred on the origin.
    pub fn walled(size: f32) -> Self {
        let h = size / 2.0;
        let corners = [
            ObstaclePoint::new(-h, -h),
            ObstaclePoint::new(h, -h),
            ObstaclePoint::new(h, h),
            ObstaclePoint::new(-h, h),
        ];
        let mut world = Self::empty();
        for i in 0..4 {
            world = world.with_segment(corners[i], corners[(i + 1) % 4]);
        }
        world
    }

    pub fn with_circle(mut self, center: ObstaclePoint, radius: f32) -> Self {
        self.obstacles.push(Obstacle::Circle { center, radius });
        self
    }

    pub fn with_segment(mut self, a: ObstaclePoint, b: ObstaclePoint) -> Self {
        self.obstacles.push(Obstacle::Segment { a, b });
        self
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Distance to the first obstacle along `angle` from `origin`, if any is
    /// within `max_range`.
    pub fn ray_cast(&self, origin: ObstaclePoint, angle: f32, max_range: f32) -> Option<f32> {
        let (sin, cos) = angle.sin_cos();
        let dir = ObstaclePoint::new(cos, sin);
        self.obstacles
            .iter()
            .filter_map(|o| o.ray_hit(origin, dir))
            .fold(None, |best: Option<f32>, t| Some(best.map_or(t, |b| b.min(t))))
            .filter(|t| *t <= max_range)
    }

    /// Whether the body rectangle placed at `pose` touches any obstacle.
    pub fn collides(&self, pose: Pose, body: &VehicleFootprint) -> bool {
        let to_body = Transform2D::from_pose(pose).inverse();
        self.obstacles
            .iter()
            .any(|o| o.to_frame(&to_body).overlaps(body))
    }
}

/// Named worlds selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// No obstacles at all.
    Empty,
    /// Walled square room with a few pillars.
    #[default]
    Arena,
    /// Dead-end corridor forcing a reversal.
    Corridor,
}

impl Scenario {
    /// Build the world; `size` scales the arena and corridor length.
    pub fn build(self, size: f32) -> SimWorld {
        match self {
            Scenario::Empty => SimWorld::empty(),
            Scenario::Arena => {
                let q = size / 4.0;
                SimWorld::walled(size)
                    .with_circle(ObstaclePoint::new(q, q), 0.25)
                    .with_circle(ObstaclePoint::new(-q, q * 0.5), 0.3)
                    .with_circle(ObstaclePoint::new(q * 0.5, -q), 0.2)
                    .with_segment(
                        ObstaclePoint::new(-q, -q),
                        ObstaclePoint::new(-q * 0.2, -q * 1.4),
                    )
            }
            Scenario::Corridor => SimWorld::empty()
                .with_segment(ObstaclePoint::new(-1.0, 0.6), ObstaclePoint::new(size, 0.6))
                .with_segment(ObstaclePoint::new(-1.0, -0.6), ObstaclePoint::new(size, -0.6))
                .with_segment(ObstaclePoint::new(size, -0.6), ObstaclePoint::new(size, 0.6)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle model
// ────────────────────────────────────────────────────────────────────────────

/// Kinematic parameters of the simulated car.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Steady-state speed per unit throttle (m/s).
    pub speed_per_throttle: f32,
    /// Acceleration toward the commanded speed (m/s²).
    pub acceleration: f32,
    /// Deceleration while a throttle opposes the motion (m/s²).
    pub brake_deceleration: f32,
    /// Turn radius at full steering lock (m).
    pub min_turn_radius: f32,
    pub beams: usize,
    pub max_range: f32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            speed_per_throttle: 1.0,
            acceleration: 1.5,
            brake_deceleration: 3.0,
            min_turn_radius: 0.44,
            beams: 360,
            max_range: 8.0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    world: SimWorld,
    params: VehicleParams,
    calibration: SensorCalibration,
    body: VehicleFootprint,
    pose: Pose,
    velocity: f32,
    yaw_rate: f32,
    travelled: f32,
    steering: f32,
    throttle: f32,
    /// Sign of the last non-zero velocity.
    motion_sign: f32,
    /// Throttle has been neutral since the vehicle last moved; an opposing
    /// throttle then reverses instead of braking.
    neutral_seen: bool,
    collisions: u64,
}

impl SimState {
    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        if self.throttle.abs() < EPSILON {
            self.neutral_seen = true;
        }
        let target = self.throttle * self.params.speed_per_throttle;
        let opposing = self.throttle * self.motion_sign < 0.0 && !self.neutral_seen;
        self.velocity = if opposing {
            approach(self.velocity, 0.0, self.params.brake_deceleration * dt)
        } else {
            approach(self.velocity, target, self.params.acceleration * dt)
        };
        if self.velocity.abs() > EPSILON {
            self.motion_sign = self.velocity.signum();
            self.neutral_seen = false;
        }

        // Negative steering turns left, i.e. counter-clockwise.
        let curvature = -self.steering / self.params.min_turn_radius;
        let yaw_rate = self.velocity * curvature;
        let distance = self.velocity * dt;
        let heading = self.pose.heading + yaw_rate * dt;
        let mid = self.pose.heading + yaw_rate * dt / 2.0;
        let next = Pose::new(
            self.pose.x + distance * mid.cos(),
            self.pose.y + distance * mid.sin(),
            normalize_angle(heading),
        );

        if self.world.collides(next, &self.body) {
            if self.velocity.abs() > EPSILON {
                debug!(x = self.pose.x, y = self.pose.y, "sim collision");
            }
            self.collisions += 1;
            self.velocity = 0.0;
            self.yaw_rate = 0.0;
            return;
        }
        self.pose = next;
        self.yaw_rate = yaw_rate;
        self.travelled += distance;
    }

    fn scan(&self) -> Vec<RangeSample> {
        let beams = self.params.beams.max(1);
        let step = TAU / beams as f32;
        let origin = ObstaclePoint::new(self.pose.x, self.pose.y);
        (0..beams)
            .filter_map(|i| {
                let angle = i as f32 * step;
                let world_angle = self.pose.heading + self.calibration.mount_angle + angle;
                self.world
                    .ray_cast(origin, world_angle, self.params.max_range)
                    .map(|d| RangeSample::new(d, angle))
            })
            .collect()
    }
}

fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    current + (target - current).clamp(-max_delta, max_delta)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulator
// ────────────────────────────────────────────────────────────────────────────

/// Shared simulation handle.  Cloning yields another handle to the same
/// vehicle.
#[derive(Debug, Clone)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    pub fn new(world: SimWorld) -> Self {
        Self::with_params(world, VehicleParams::default(), SensorCalibration::default())
    }

    pub fn with_params(
        world: SimWorld,
        params: VehicleParams,
        calibration: SensorCalibration,
    ) -> Self {
        let body = calibration_to_footprint(&calibration);
        Self {
            state: Arc::new(Mutex::new(SimState {
                world,
                params,
                calibration,
                body,
                pose: Pose::default(),
                velocity: 0.0,
                yaw_rate: 0.0,
                travelled: 0.0,
                steering: 0.0,
                throttle: 0.0,
                motion_sign: 0.0,
                neutral_seen: true,
                collisions: 0,
            })),
        }
    }

    /// Place the vehicle (sensor origin) at `pose`.
    pub fn with_pose(self, pose: Pose) -> Self {
        self.lock().pose = pose;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance the model by `dt` seconds.
    pub fn step(&self, dt: f32) {
        self.lock().step(dt);
    }

    /// Ground-truth pose.
    pub fn pose(&self) -> Pose {
        self.lock().pose
    }

    /// Ground-truth signed speed.
    pub fn velocity(&self) -> f32 {
        self.lock().velocity
    }

    /// Number of steps cancelled by a collision.
    pub fn collisions(&self) -> u64 {
        self.lock().collisions
    }

    pub fn body(&self) -> VehicleFootprint {
        self.lock().body
    }

    pub fn range_sensor(&self) -> SimRangeSensor {
        SimRangeSensor {
            sim: self.clone(),
            last_scan: Vec::new(),
        }
    }

    pub fn motion_source(&self) -> SimMotionSource {
        SimMotionSource { sim: self.clone() }
    }

    pub fn channel(&self, id: &str) -> SimChannel {
        SimChannel {
            sim: self.clone(),
            id: id.to_string(),
        }
    }

    /// Drive train wired to this vehicle's steering and throttle inputs.
    pub fn drive_train(&self) -> DriveTrain {
        DriveTrain::new()
            .with_channel(Box::new(self.channel(STEERING)))
            .with_channel(Box::new(self.channel(THROTTLE)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver handles
// ────────────────────────────────────────────────────────────────────────────

/// Ray-cast range sensor.
#[derive(Debug)]
pub struct SimRangeSensor {
    sim: Simulator,
    last_scan: Vec<RangeSample>,
}

impl RangeSensor for SimRangeSensor {
    fn points_within(&mut self, limit: f32, cached: bool) -> Result<Vec<RangeSample>, RoverError> {
        if !cached || self.last_scan.is_empty() {
            self.last_scan = self.sim.lock().scan();
        }
        Ok(self
            .last_scan
            .iter()
            .copied()
            .filter(|s| s.distance < limit)
            .collect())
    }

    fn cached_points(&self) -> Vec<RangeSample> {
        self.last_scan.clone()
    }

    fn calibration(&self) -> SensorCalibration {
        self.sim.lock().calibration
    }
}

/// Ideal odometry and gyro.
#[derive(Debug)]
pub struct SimMotionSource {
    sim: Simulator,
}

impl MotionSource for SimMotionSource {
    fn odometry(&mut self) -> Result<OdometrySample, RoverError> {
        let state = self.sim.lock();
        Ok(OdometrySample {
            travelled: state.travelled,
            heading: state.pose.heading,
        })
    }

    fn imu(&mut self) -> Option<ImuSample> {
        Some(ImuSample {
            yaw_rate: self.sim.lock().yaw_rate,
        })
    }
}

/// Steering or throttle input of the simulated car.
#[derive(Debug)]
pub struct SimChannel {
    sim: Simulator,
    id: String,
}

impl Actuator for SimChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_output(&mut self, value: f32) -> Result<(), RoverError> {
        let mut state = self.sim.lock();
        match self.id.as_str() {
            STEERING => state.steering = value,
            THROTTLE => state.throttle = value,
            other => {
                warn!(channel = other, "unknown sim channel");
                return Err(RoverError::ActuatorFault {
                    channel: other.to_string(),
                    details: "simulator only has steering and throttle".to_string(),
                });
            }
        }
        Ok(())
    }

    fn output(&self) -> f32 {
        let state = self.sim.lock();
        match self.id.as_str() {
            STEERING => state.steering,
            THROTTLE => state.throttle,
            _ => 0.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
