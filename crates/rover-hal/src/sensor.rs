//! Sensor seams: the range sensor and the motion source feeding the
//! tracker.

use rover_perception::geometry::{calibration_to_footprint, polar_to_cartesian};
use rover_perception::tracker::{ImuSample, OdometrySample};
use rover_types::{ObstaclePoint, RangeSample, RoverError, SensorCalibration, VehicleFootprint};

/// A 2-D range sensor (planar lidar).
pub trait RangeSensor: Send {
    /// Samples closer than `limit`.  With `cached == false` a fresh scan is
    /// taken first; otherwise the last scan is filtered.
    ///
    /// # Errors
    ///
    /// [`RoverError::SensorUnavailable`] when no scan can be obtained.
    fn points_within(&mut self, limit: f32, cached: bool) -> Result<Vec<RangeSample>, RoverError>;

    /// The last scan, unfiltered.
    fn cached_points(&self) -> Vec<RangeSample>;

    fn calibration(&self) -> SensorCalibration;

    /// Body rectangle relative to the sensor.
    fn footprint(&self) -> VehicleFootprint {
        calibration_to_footprint(&self.calibration())
    }

    /// Convert samples to vehicle-frame points using the mount angle.
    fn to_cartesian(&self, samples: &[RangeSample]) -> Vec<ObstaclePoint> {
        let mount = self.calibration().mount_angle;
        samples
            .iter()
            .map(|s| polar_to_cartesian(*s, mount))
            .collect()
    }
}

/// Raw inputs of the dead-reckoning tracker.
pub trait MotionSource: Send {
    /// # Errors
    ///
    /// [`RoverError::SensorUnavailable`] when the encoders cannot be read.
    fn odometry(&mut self) -> Result<OdometrySample, RoverError>;

    /// Latest gyro reading, `None` when no IMU is fitted.
    fn imu(&mut self) -> Option<ImuSample>;
}
