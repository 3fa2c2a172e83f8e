//! Generic `Actuator` trait for the vehicle's output channels (steering
//! servo, ESC throttle, ...).
//!
//! Drivers implement this trait and are registered with a
//! [`DriveTrain`][crate::drivetrain::DriveTrain].  The planner only ever
//! talks to the drive train, so drivers can be swapped without touching
//! navigation logic.

use rover_types::RoverError;

/// A normalised output channel taking values in `[-1, 1]`.
pub trait Actuator: Send + Sync {
    /// Stable identifier for this channel, e.g. `"steering"` or
    /// `"throttle"`.
    fn id(&self) -> &str;

    /// Command the channel to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::ActuatorFault`] if the command cannot be
    /// applied (driver disconnected, ESC not armed, ...).
    fn set_output(&mut self, value: f32) -> Result<(), RoverError>;

    /// Most recently commanded value.
    fn output(&self) -> f32;
}
