//! [`DriveTrain`] – routes [`DirectionCommand`]s to the steering and
//! throttle channels.
//!
//! Channels are looked up by identifier: register one actuator with id
//! [`STEERING`] and one with id [`THROTTLE`].
//!
//! # Example
//!
//! ```rust
//! use rover_hal::drivetrain::{DriveTrain, THROTTLE};
//! use rover_hal::sim::{Simulator, SimWorld};
//! use rover_types::DirectionCommand;
//!
//! let sim = Simulator::new(SimWorld::empty());
//! let mut drive = sim.drive_train();
//!
//! drive.apply(&DirectionCommand::FULL_FORWARD).unwrap();
//! assert_eq!(drive.output(THROTTLE), Some(0.5));
//! ```

use std::collections::HashMap;

use rover_types::{DirectionCommand, RoverError};
use tracing::debug;

use crate::actuator::Actuator;

/// Identifier of the steering channel.
pub const STEERING: &str = "steering";
/// Identifier of the throttle channel.
pub const THROTTLE: &str = "throttle";

/// Steering + throttle channel pair with command bookkeeping.
#[derive(Default)]
pub struct DriveTrain {
    channels: HashMap<String, Box<dyn Actuator>>,
    last_command: Option<DirectionCommand>,
}

impl DriveTrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.  A previously registered channel with the same
    /// id is replaced.
    pub fn register(&mut self, channel: Box<dyn Actuator>) {
        self.channels.insert(channel.id().to_string(), channel);
    }

    /// Builder-style [`register`][Self::register].
    pub fn with_channel(mut self, channel: Box<dyn Actuator>) -> Self {
        self.register(channel);
        self
    }

    /// Write a steering value, clamped to `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// [`RoverError::ActuatorFault`] when the channel is missing, the value
    /// is not finite, or the driver fails.
    pub fn apply_steering(&mut self, value: f32) -> Result<(), RoverError> {
        self.write(STEERING, value)
    }

    /// Write a throttle value, clamped to `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Same as [`apply_steering`][Self::apply_steering].
    pub fn apply_throttle(&mut self, value: f32) -> Result<(), RoverError> {
        self.write(THROTTLE, value)
    }

    /// Apply a whole command: steering first, then throttle.
    ///
    /// The command is only recorded as applied when both channels accepted
    /// it.
    pub fn apply(&mut self, command: &DirectionCommand) -> Result<(), RoverError> {
        self.apply_steering(command.steering_value())?;
        self.apply_throttle(command.throttle_value())?;
        self.last_command = Some(*command);
        debug!(%command, "drive train applied");
        Ok(())
    }

    /// Neutral steering and zero throttle.
    pub fn stop(&mut self) -> Result<(), RoverError> {
        self.apply(&DirectionCommand::STOP)
    }

    /// Last command both channels accepted.
    pub fn last_command(&self) -> Option<DirectionCommand> {
        self.last_command
    }

    /// Current output of the channel with `id`.
    pub fn output(&self, id: &str) -> Option<f32> {
        self.channels.get(id).map(|ch| ch.output())
    }

    fn write(&mut self, id: &str, value: f32) -> Result<(), RoverError> {
        if !value.is_finite() {
            return Err(RoverError::ActuatorFault {
                channel: id.to_string(),
                details: format!("non-finite output {value}"),
            });
        }
        match self.channels.get_mut(id) {
            Some(channel) => channel.set_output(value.clamp(-1.0, 1.0)),
            None => Err(RoverError::ActuatorFault {
                channel: id.to_string(),
                details: format!("channel '{id}' is not registered"),
            }),
        }
    }
}
