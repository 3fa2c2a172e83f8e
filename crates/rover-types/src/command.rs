//! Canonical steering/throttle commands.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::sector::{MovementSector, SteeringClass, TravelDirection};

/// The throttle positions the planner is allowed to emit.
///
/// Brakes are reverse throttle pulses used to decelerate before a direction
/// change: `ForwardBrake` brakes *forward* motion (negative value),
/// `BackwardBrake` brakes *backward* motion (positive value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Throttle {
    Stop,
    Forward,
    Backward,
    ForwardBrake,
    BackwardBrake,
}

impl Throttle {
    /// Throttle value in `[-1, 1]`.
    pub const fn value(self) -> f32 {
        match self {
            Throttle::Stop => 0.0,
            Throttle::Forward => 0.5,
            Throttle::Backward => -0.5,
            Throttle::ForwardBrake => -0.4,
            Throttle::BackwardBrake => 0.4,
        }
    }

    /// Full throttle that drives in `direction`.
    pub const fn drive(direction: TravelDirection) -> Self {
        match direction {
            TravelDirection::Forward => Throttle::Forward,
            TravelDirection::Backward => Throttle::Backward,
        }
    }

    /// Brake pulse that decelerates motion in `direction`.
    pub const fn brake(direction: TravelDirection) -> Self {
        match direction {
            TravelDirection::Forward => Throttle::ForwardBrake,
            TravelDirection::Backward => Throttle::BackwardBrake,
        }
    }

    /// Direction of travel for full throttles, `None` for stop and brakes.
    pub const fn drive_direction(self) -> Option<TravelDirection> {
        match self {
            Throttle::Forward => Some(TravelDirection::Forward),
            Throttle::Backward => Some(TravelDirection::Backward),
            _ => None,
        }
    }

    /// The motion a brake pulse is decelerating, `None` for non-brakes.
    pub const fn braked_direction(self) -> Option<TravelDirection> {
        match self {
            Throttle::ForwardBrake => Some(TravelDirection::Forward),
            Throttle::BackwardBrake => Some(TravelDirection::Backward),
            _ => None,
        }
    }

    pub const fn is_brake(self) -> bool {
        matches!(self, Throttle::ForwardBrake | Throttle::BackwardBrake)
    }
}

/// A complete actuator command.  Exactly one is active per tick.
///
/// ```rust
/// use rover_types::{DirectionCommand, MovementSector};
///
/// let cmd = DirectionCommand::drive(MovementSector::SlightLeftForward);
/// assert_eq!(cmd.steering_value(), -0.5);
/// assert_eq!(cmd.throttle_value(), 0.5);
/// assert!(DirectionCommand::STOP.is_stop());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct DirectionCommand {
    pub steering: SteeringClass,
    pub throttle: Throttle,
}

impl DirectionCommand {
    pub const STOP: Self = Self::new(SteeringClass::Straight, Throttle::Stop);
    pub const FULL_FORWARD: Self = Self::new(SteeringClass::Straight, Throttle::Forward);
    pub const FULL_BACKWARD: Self = Self::new(SteeringClass::Straight, Throttle::Backward);
    pub const FORWARD_BRAKE: Self = Self::new(SteeringClass::Straight, Throttle::ForwardBrake);
    pub const BACKWARD_BRAKE: Self = Self::new(SteeringClass::Straight, Throttle::BackwardBrake);

    pub const fn new(steering: SteeringClass, throttle: Throttle) -> Self {
        Self { steering, throttle }
    }

    /// Full throttle along `sector`.
    pub const fn drive(sector: MovementSector) -> Self {
        Self::new(sector.steering(), Throttle::drive(sector.direction()))
    }

    pub const fn steering_value(&self) -> f32 {
        self.steering.value()
    }

    pub const fn throttle_value(&self) -> f32 {
        self.throttle.value()
    }

    pub fn is_stop(&self) -> bool {
        self.throttle == Throttle::Stop
    }

    /// The sector this command drives along, if it is a full throttle.
    pub fn sector(&self) -> Option<MovementSector> {
        self.throttle
            .drive_direction()
            .map(|direction| MovementSector::from_parts(self.steering, direction))
    }
}

impl Default for DirectionCommand {
    fn default() -> Self {
        Self::STOP
    }
}

impl fmt::Display for DirectionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steering={:+.2} throttle={:+.2}",
            self.steering_value(),
            self.throttle_value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_values_within_unit_range() {
        for throttle in [
            Throttle::Stop,
            Throttle::Forward,
            Throttle::Backward,
            Throttle::ForwardBrake,
            Throttle::BackwardBrake,
        ] {
            assert!((-1.0..=1.0).contains(&throttle.value()));
        }
        for sector in MovementSector::ALL {
            let cmd = DirectionCommand::drive(sector);
            assert!((-1.0..=1.0).contains(&cmd.steering_value()));
        }
    }

    #[test]
    fn brakes_oppose_the_motion_they_stop() {
        assert!(Throttle::ForwardBrake.value() < 0.0);
        assert!(Throttle::BackwardBrake.value() > 0.0);
        assert_eq!(
            Throttle::brake(TravelDirection::Forward).braked_direction(),
            Some(TravelDirection::Forward)
        );
    }

    #[test]
    fn drive_command_round_trips_to_sector() {
        for sector in MovementSector::ALL {
            assert_eq!(DirectionCommand::drive(sector).sector(), Some(sector));
        }
        assert_eq!(DirectionCommand::STOP.sector(), None);
        assert_eq!(DirectionCommand::FORWARD_BRAKE.sector(), None);
    }

    #[test]
    fn display_shows_numeric_values() {
        let text = DirectionCommand::FORWARD_BRAKE.to_string();
        assert!(text.contains("throttle=-0.40"), "{text}");
    }

    #[test]
    fn command_serialization_roundtrip() {
        let cmd = DirectionCommand::drive(MovementSector::FullRightBackward);
        let json = serde_json::to_string(&cmd).unwrap();
        let back: DirectionCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }
}
