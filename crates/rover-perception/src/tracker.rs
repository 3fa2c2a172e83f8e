//! Motion tracking.
//!
//! A [`DeadReckoner`] fuses wheel odometry (signed travelled distance plus
//! the encoder-derived heading) with gyroscope yaw rate using a
//! complementary filter:
//!
//! ```text
//! predicted = heading + ω * dt
//! heading   = predicted + (1 − α) * wrap(heading_odom − predicted)
//! ```
//!
//! Position integrates each odometry increment along the mid-step heading.
//! Speed is an exponentially smoothed magnitude.  The net travel direction
//! is the sign of the summed increments over a short rolling window, with a
//! dead band so a vehicle rocking in place reads as still.
//!
//! Estimates are published into a [`MotionCell`], a lock-free single-value
//! mailbox read by the control loop.  A read never mixes two updates, but
//! may be one update stale.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::tracker::{
//!     DeadReckoner, ImuSample, MotionCell, MotionTracker, OdometrySample, TrackerConfig,
//! };
//! use rover_types::DirectionSign;
//!
//! let mut reckoner = DeadReckoner::new(TrackerConfig::default());
//! let cell = MotionCell::new();
//!
//! for i in 0..=10 {
//!     let odom = OdometrySample { travelled: i as f32 * 0.01, heading: 0.0 };
//!     cell.publish(reckoner.update(odom, Some(ImuSample { yaw_rate: 0.0 }), 0.02));
//! }
//!
//! assert_eq!(cell.net_direction(), DirectionSign::Forward);
//! assert!((cell.pose().x - 0.1).abs() < 1e-4);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI8, AtomicU32, AtomicU64, Ordering, fence};

use rover_types::{DirectionSign, Pose};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::normalize_angle;

// ────────────────────────────────────────────────────────────────────────────
// MotionTracker
// ────────────────────────────────────────────────────────────────────────────

/// Read side of the motion estimate consumed by the control loop.
pub trait MotionTracker: Send + Sync {
    fn pose(&self) -> Pose;

    /// Unsigned speed in m/s.
    fn speed(&self) -> f32;

    fn net_direction(&self) -> DirectionSign;

    /// Pose, speed and direction read together.  Implementations that can
    /// be written concurrently return all three from the same update.
    fn estimate(&self) -> MotionEstimate {
        MotionEstimate {
            pose: self.pose(),
            speed: self.speed(),
            direction: self.net_direction(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input / output types
// ────────────────────────────────────────────────────────────────────────────

/// Cumulative wheel odometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OdometrySample {
    /// Signed distance travelled since start (metres, negative when
    /// reversing).
    pub travelled: f32,
    /// Heading from the wheel model (radians).
    pub heading: f32,
}

/// Gyroscope reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    /// Yaw rate around the vertical axis (rad/s, counter-clockwise).
    pub yaw_rate: f32,
}

/// One fused estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionEstimate {
    pub pose: Pose,
    pub speed: f32,
    pub direction: DirectionSign,
}

/// Tuning of the dead-reckoning filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Complementary filter coefficient; higher trusts the gyro more.
    pub alpha: f32,
    /// Number of increments summed for the direction sign.
    pub window: usize,
    /// Net displacement (metres) under which the vehicle counts as still.
    pub dead_band: f32,
    /// Weight of the newest speed reading in the exponential average.
    pub speed_smoothing: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.98,
            window: 10,
            dead_band: 0.005,
            speed_smoothing: 0.3,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DeadReckoner
// ────────────────────────────────────────────────────────────────────────────

/// Complementary-filter dead reckoning from odometry and gyro.
#[derive(Debug)]
pub struct DeadReckoner {
    config: TrackerConfig,
    pose: Pose,
    speed: f32,
    last_travelled: Option<f32>,
    increments: VecDeque<f32>,
}

impl DeadReckoner {
    pub fn new(config: TrackerConfig) -> Self {
        let config = TrackerConfig {
            alpha: config.alpha.clamp(0.0, 1.0),
            window: config.window.max(1),
            speed_smoothing: config.speed_smoothing.clamp(0.0, 1.0),
            ..config
        };
        Self {
            increments: VecDeque::with_capacity(config.window),
            config,
            pose: Pose::default(),
            speed: 0.0,
            last_travelled: None,
        }
    }

    /// Start integrating from `pose` instead of the origin.
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Fold one odometry (and optional gyro) reading into the estimate.
    ///
    /// `dt` is the time since the previous update (seconds); negative
    /// values are treated as zero.  The first odometry sample only sets the
    /// reference distance.
    pub fn update(
        &mut self,
        odom: OdometrySample,
        imu: Option<ImuSample>,
        dt: f32,
    ) -> MotionEstimate {
        let dt = dt.max(0.0);
        let delta = self
            .last_travelled
            .map_or(0.0, |last| odom.travelled - last);
        self.last_travelled = Some(odom.travelled);

        let previous_heading = self.pose.heading;
        let heading = match imu {
            Some(imu) => {
                let predicted = previous_heading + imu.yaw_rate * dt;
                let correction = normalize_angle(odom.heading - predicted);
                normalize_angle(predicted + (1.0 - self.config.alpha) * correction)
            }
            None => normalize_angle(odom.heading),
        };

        let mid = previous_heading + normalize_angle(heading - previous_heading) / 2.0;
        self.pose = Pose::new(
            self.pose.x + delta * mid.cos(),
            self.pose.y + delta * mid.sin(),
            heading,
        );

        if dt > 0.0 {
            let instant = delta.abs() / dt;
            let s = self.config.speed_smoothing;
            self.speed = s * instant + (1.0 - s) * self.speed;
        }

        if self.increments.len() == self.config.window {
            self.increments.pop_front();
        }
        self.increments.push_back(delta);

        let estimate = self.estimate();
        trace!(
            x = estimate.pose.x,
            y = estimate.pose.y,
            heading = estimate.pose.heading,
            speed = estimate.speed,
            direction = estimate.direction.value(),
            "dead reckoning"
        );
        estimate
    }

    /// Current estimate without consuming a new reading.
    pub fn estimate(&self) -> MotionEstimate {
        let net: f32 = self.increments.iter().sum();
        MotionEstimate {
            pose: self.pose,
            speed: self.speed,
            direction: DirectionSign::from_displacement(net, self.config.dead_band),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MotionCell
// ────────────────────────────────────────────────────────────────────────────

/// `f32` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order);
    }
}

/// Lock-free last-value mailbox between the tracker task and the control
/// loop.
///
/// A sequence counter guards the fields: it is odd while a publish is in
/// progress and readers retry until they see the same even value before and
/// after copying.  Concurrent publishers serialise on the counter.
#[derive(Debug)]
pub struct MotionCell {
    seq: AtomicU64,
    x: AtomicF32,
    y: AtomicF32,
    heading: AtomicF32,
    speed: AtomicF32,
    direction: AtomicI8,
}

impl MotionCell {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            x: AtomicF32::new(0.0),
            y: AtomicF32::new(0.0),
            heading: AtomicF32::new(0.0),
            speed: AtomicF32::new(0.0),
            direction: AtomicI8::new(0),
        }
    }

    pub fn publish(&self, estimate: MotionEstimate) {
        let start = self.begin_write();
        self.x.store(estimate.pose.x, Ordering::Relaxed);
        self.y.store(estimate.pose.y, Ordering::Relaxed);
        self.heading.store(estimate.pose.heading, Ordering::Relaxed);
        self.speed.store(estimate.speed, Ordering::Relaxed);
        self.direction
            .store(estimate.direction.value(), Ordering::Relaxed);
        self.seq.store(start.wrapping_add(2), Ordering::Release);
    }

    /// Take the write side: move the counter from even to odd.
    fn begin_write(&self) -> u64 {
        loop {
            let current = self.seq.load(Ordering::Relaxed);
            if current % 2 == 0
                && self
                    .seq
                    .compare_exchange_weak(
                        current,
                        current.wrapping_add(1),
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                fence(Ordering::Release);
                return current;
            }
            std::hint::spin_loop();
        }
    }

    /// Number of estimates published so far.
    pub fn updates(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }

    /// The last published estimate, all fields from the same update.
    pub fn snapshot(&self) -> MotionEstimate {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let estimate = MotionEstimate {
                pose: Pose::new(
                    self.x.load(Ordering::Relaxed),
                    self.y.load(Ordering::Relaxed),
                    self.heading.load(Ordering::Relaxed),
                ),
                speed: self.speed.load(Ordering::Relaxed),
                direction: DirectionSign::from_value(self.direction.load(Ordering::Relaxed)),
            };
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return estimate;
            }
        }
    }
}

impl Default for MotionCell {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTracker for MotionCell {
    fn pose(&self) -> Pose {
        self.snapshot().pose
    }

    fn speed(&self) -> f32 {
        self.snapshot().speed
    }

    fn net_direction(&self) -> DirectionSign {
        self.snapshot().direction
    }

    fn estimate(&self) -> MotionEstimate {
        self.snapshot()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::sync::Arc;

    use super::*;

    fn odom(travelled: f32, heading: f32) -> OdometrySample {
        OdometrySample { travelled, heading }
    }

    #[test]
    fn first_sample_sets_reference_only() {
        let mut r = DeadReckoner::new(TrackerConfig::default());
        let e = r.update(odom(5.0, 0.0), None, 0.02);
        assert_eq!(e.pose.x, 0.0);
        assert_eq!(e.direction, DirectionSign::Still);
    }

    #[test]
    fn straight_forward_integrates_position() {
        let mut r = DeadReckoner::new(TrackerConfig::default());
        let mut e = MotionEstimate::default();
        for i in 0..=20 {
            e = r.update(odom(i as f32 * 0.01, 0.0), None, 0.02);
        }
        assert!((e.pose.x - 0.2).abs() < 1e-4);
        assert!(e.pose.y.abs() < 1e-6);
        assert_eq!(e.direction, DirectionSign::Forward);
        // 0.01 m every 0.02 s.
        assert!((e.speed - 0.5).abs() < 0.01, "speed {}", e.speed);
    }

    #[test]
    fn reversing_reads_backward() {
        let mut r = DeadReckoner::new(TrackerConfig::default());
        let mut e = MotionEstimate::default();
        for i in 0..=10 {
            e = r.update(odom(-(i as f32) * 0.01, 0.0), None, 0.02);
        }
        assert_eq!(e.direction, DirectionSign::Backward);
        assert!(e.pose.x < 0.0);
        assert!(e.speed > 0.0);
    }

    #[test]
    fn jitter_inside_dead_band_is_still() {
        let mut r = DeadReckoner::new(TrackerConfig::default());
        let mut e = MotionEstimate::default();
        for i in 0..20 {
            let jitter = if i % 2 == 0 { 0.001 } else { -0.001 };
            e = r.update(odom(jitter, 0.0), None, 0.02);
        }
        assert_eq!(e.direction, DirectionSign::Still);
    }

    #[test]
    fn direction_window_forgets_old_motion() {
        let mut r = DeadReckoner::new(TrackerConfig {
            window: 5,
            ..TrackerConfig::default()
        });
        for i in 0..=5 {
            r.update(odom(i as f32 * 0.05, 0.0), None, 0.02);
        }
        assert_eq!(r.estimate().direction, DirectionSign::Forward);
        for _ in 0..5 {
            r.update(odom(0.25, 0.0), None, 0.02);
        }
        assert_eq!(r.estimate().direction, DirectionSign::Still);
    }

    #[test]
    fn gyro_dominates_heading_with_high_alpha() {
        let mut r = DeadReckoner::new(TrackerConfig {
            alpha: 1.0,
            ..TrackerConfig::default()
        });
        r.update(odom(0.0, 0.0), None, 0.0);
        // Odometry claims no rotation; the gyro says 1 rad/s for 0.5 s.
        let e = r.update(odom(0.0, 0.0), Some(ImuSample { yaw_rate: 1.0 }), 0.5);
        assert!((e.pose.heading - 0.5).abs() < 1e-5);
    }

    #[test]
    fn odometry_corrects_heading_with_low_alpha() {
        let mut r = DeadReckoner::new(TrackerConfig {
            alpha: 0.0,
            ..TrackerConfig::default()
        });
        let e = r.update(odom(0.0, 0.3), Some(ImuSample { yaw_rate: 5.0 }), 0.1);
        assert!((e.pose.heading - 0.3).abs() < 1e-5);
    }

    #[test]
    fn heading_blend_wraps_across_pi() {
        let mut r = DeadReckoner::new(TrackerConfig {
            alpha: 0.5,
            ..TrackerConfig::default()
        })
        .with_pose(Pose::new(0.0, 0.0, 3.1));
        let e = r.update(odom(0.0, -3.1), Some(ImuSample { yaw_rate: 0.0 }), 0.1);
        // Halfway between 3.1 and -3.1 the short way round is ±π.
        assert!((e.pose.heading.abs() - std::f32::consts::PI).abs() < 1e-3);
    }

    #[test]
    fn turning_moves_along_heading() {
        let mut r = DeadReckoner::new(TrackerConfig::default())
            .with_pose(Pose::new(0.0, 0.0, FRAC_PI_2));
        r.update(odom(0.0, FRAC_PI_2), None, 0.02);
        let e = r.update(odom(1.0, FRAC_PI_2), None, 0.02);
        assert!(e.pose.x.abs() < 1e-5);
        assert!((e.pose.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn motion_cell_publishes_last_value() {
        let cell = MotionCell::new();
        assert_eq!(cell.updates(), 0);
        assert_eq!(cell.net_direction(), DirectionSign::Still);
        cell.publish(MotionEstimate {
            pose: Pose::new(1.0, -2.0, 0.25),
            speed: 0.4,
            direction: DirectionSign::Backward,
        });
        assert_eq!(cell.updates(), 1);
        assert_eq!(cell.pose(), Pose::new(1.0, -2.0, 0.25));
        assert_eq!(cell.speed(), 0.4);
        assert_eq!(cell.net_direction(), DirectionSign::Backward);
    }

    #[test]
    fn motion_cell_shared_across_threads() {
        let cell = Arc::new(MotionCell::new());
        let writer = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                writer.publish(MotionEstimate {
                    pose: Pose::new(i as f32, 0.0, 0.0),
                    speed: 0.1,
                    direction: DirectionSign::Forward,
                });
            }
        });
        handle.join().unwrap();
        assert_eq!(cell.updates(), 100);
        assert_eq!(cell.pose().x, 99.0);
        assert_eq!(cell.snapshot().direction, DirectionSign::Forward);
    }

    #[test]
    fn concurrent_reads_never_mix_updates() {
        let cell = MotionCell::new();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=200_000 {
                    let v = i as f32;
                    cell.publish(MotionEstimate {
                        pose: Pose::new(v, v, 0.0),
                        speed: v,
                        direction: DirectionSign::Forward,
                    });
                }
            });
            scope.spawn(|| {
                let mut last = 0.0;
                while cell.updates() < 200_000 {
                    let estimate = cell.estimate();
                    assert_eq!(estimate.pose.x, estimate.pose.y);
                    assert_eq!(estimate.pose.x, estimate.speed);
                    assert!(estimate.speed >= last, "estimates went backwards");
                    last = estimate.speed;
                }
            });
        });
        assert_eq!(cell.snapshot().speed, 200_000.0);
    }

    #[test]
    fn default_estimate_combines_accessors() {
        struct Fixed;
        impl MotionTracker for Fixed {
            fn pose(&self) -> Pose {
                Pose::new(1.0, 2.0, 0.5)
            }
            fn speed(&self) -> f32 {
                0.3
            }
            fn net_direction(&self) -> DirectionSign {
                DirectionSign::Backward
            }
        }
        let estimate = Fixed.estimate();
        assert_eq!(estimate.pose, Pose::new(1.0, 2.0, 0.5));
        assert_eq!(estimate.speed, 0.3);
        assert_eq!(estimate.direction, DirectionSign::Backward);
    }
}
