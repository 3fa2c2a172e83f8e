//! `rover-hal` – hardware seams of the rover.
//!
//! # Modules
//!
//! - [`actuator`] – the [`Actuator`][actuator::Actuator] output channel
//!   trait.
//! - [`drivetrain`] – [`DriveTrain`][drivetrain::DriveTrain]: applies a
//!   whole [`DirectionCommand`][rover_types::DirectionCommand] to the
//!   steering and throttle channels.
//! - [`sensor`] – [`RangeSensor`][sensor::RangeSensor] and
//!   [`MotionSource`][sensor::MotionSource] driver traits.
//! - [`sim`] – [`Simulator`][sim::Simulator]: ray-cast lidar, ideal
//!   odometry and a kinematic car in a world of static obstacles.

pub mod actuator;
pub mod drivetrain;
pub mod sensor;
pub mod sim;

pub use actuator::Actuator;
pub use drivetrain::DriveTrain;
pub use sensor::{MotionSource, RangeSensor};
