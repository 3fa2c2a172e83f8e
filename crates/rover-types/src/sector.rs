//! The closed set of movement sectors and the [`SectorMap`] container indexed
//! by them.
//!
//! Every tick the planner evaluates exactly ten candidate motions: five
//! steering classes, each driven forward or backward.  Keeping them as an
//! enumeration (instead of `(steering, throttle)` float tuples) makes every
//! per-sector table exhaustive by construction.

use std::fmt;
use std::ops::{Index, IndexMut};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// SteeringClass / TravelDirection
// ────────────────────────────────────────────────────────────────────────────

/// Discrete steering positions.  Negative steering turns left (+y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SteeringClass {
    Straight,
    FullLeft,
    FullRight,
    SlightLeft,
    SlightRight,
}

impl SteeringClass {
    /// Steering servo value in `[-1, 1]`.
    pub const fn value(self) -> f32 {
        match self {
            SteeringClass::Straight => 0.0,
            SteeringClass::FullLeft => -1.0,
            SteeringClass::FullRight => 1.0,
            SteeringClass::SlightLeft => -0.5,
            SteeringClass::SlightRight => 0.5,
        }
    }

    /// Absolute steering deflection; `0` for straight paths.
    pub fn magnitude(self) -> f32 {
        self.value().abs()
    }
}

/// Longitudinal travel direction of a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TravelDirection {
    Forward,
    Backward,
}

impl TravelDirection {
    /// `+1.0` forward, `-1.0` backward.
    pub const fn sign(self) -> f32 {
        match self {
            TravelDirection::Forward => 1.0,
            TravelDirection::Backward => -1.0,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            TravelDirection::Forward => TravelDirection::Backward,
            TravelDirection::Backward => TravelDirection::Forward,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MovementSector
// ────────────────────────────────────────────────────────────────────────────

/// One of the ten candidate motions evaluated every tick.
///
/// The declaration order is the canonical iteration order used for every
/// deterministic tie-break in the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum MovementSector {
    StraightForward,
    FullRightForward,
    FullLeftForward,
    SlightRightForward,
    SlightLeftForward,
    StraightBackward,
    FullRightBackward,
    FullLeftBackward,
    SlightRightBackward,
    SlightLeftBackward,
}

impl MovementSector {
    /// Number of sectors.
    pub const COUNT: usize = 10;

    /// All sectors in canonical order.
    pub const ALL: [MovementSector; Self::COUNT] = [
        MovementSector::StraightForward,
        MovementSector::FullRightForward,
        MovementSector::FullLeftForward,
        MovementSector::SlightRightForward,
        MovementSector::SlightLeftForward,
        MovementSector::StraightBackward,
        MovementSector::FullRightBackward,
        MovementSector::FullLeftBackward,
        MovementSector::SlightRightBackward,
        MovementSector::SlightLeftBackward,
    ];

    /// Position of this sector in [`MovementSector::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn steering(self) -> SteeringClass {
        match self {
            MovementSector::StraightForward | MovementSector::StraightBackward => {
                SteeringClass::Straight
            }
            MovementSector::FullRightForward | MovementSector::FullRightBackward => {
                SteeringClass::FullRight
            }
            MovementSector::FullLeftForward | MovementSector::FullLeftBackward => {
                SteeringClass::FullLeft
            }
            MovementSector::SlightRightForward | MovementSector::SlightRightBackward => {
                SteeringClass::SlightRight
            }
            MovementSector::SlightLeftForward | MovementSector::SlightLeftBackward => {
                SteeringClass::SlightLeft
            }
        }
    }

    pub const fn direction(self) -> TravelDirection {
        if self.index() < 5 {
            TravelDirection::Forward
        } else {
            TravelDirection::Backward
        }
    }

    /// Look up the sector for a `(steering, direction)` pair.
    pub fn from_parts(steering: SteeringClass, direction: TravelDirection) -> Self {
        let forward = match steering {
            SteeringClass::Straight => 0,
            SteeringClass::FullRight => 1,
            SteeringClass::FullLeft => 2,
            SteeringClass::SlightRight => 3,
            SteeringClass::SlightLeft => 4,
        };
        match direction {
            TravelDirection::Forward => Self::ALL[forward],
            TravelDirection::Backward => Self::ALL[forward + 5],
        }
    }
}

impl fmt::Display for MovementSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SectorMap
// ────────────────────────────────────────────────────────────────────────────

/// A value for every [`MovementSector`], stored as a fixed array.
///
/// ```rust
/// use rover_types::{MovementSector, SectorMap};
///
/// let mut weights = SectorMap::splat(1.0_f32);
/// weights[MovementSector::FullLeftBackward] = 0.0;
///
/// assert_eq!(weights.iter().filter(|(_, w)| **w > 0.0).count(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorMap<T> {
    values: [T; MovementSector::COUNT],
}

impl<T> SectorMap<T> {
    /// Build a map by evaluating `f` once per sector in canonical order.
    pub fn from_fn(f: impl FnMut(MovementSector) -> T) -> Self {
        Self {
            values: MovementSector::ALL.map(f),
        }
    }

    /// Iterate `(sector, &value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (MovementSector, &T)> {
        MovementSector::ALL.into_iter().zip(self.values.iter())
    }

    /// Transform every value, keeping the sector association.
    pub fn map<U>(&self, mut f: impl FnMut(MovementSector, &T) -> U) -> SectorMap<U> {
        SectorMap::from_fn(|sector| f(sector, &self.values[sector.index()]))
    }
}

impl<T: Copy> SectorMap<T> {
    /// A map holding the same value for every sector.
    pub fn splat(value: T) -> Self {
        Self {
            values: [value; MovementSector::COUNT],
        }
    }
}

impl<T: Default + Copy> Default for SectorMap<T> {
    fn default() -> Self {
        Self::splat(T::default())
    }
}

impl<T> Index<MovementSector> for SectorMap<T> {
    type Output = T;

    fn index(&self, sector: MovementSector) -> &T {
        &self.values[sector.index()]
    }
}

impl<T> IndexMut<MovementSector> for SectorMap<T> {
    fn index_mut(&mut self, sector: MovementSector) -> &mut T {
        &mut self.values[sector.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_matches_index() {
        for (i, sector) in MovementSector::ALL.iter().enumerate() {
            assert_eq!(sector.index(), i);
        }
    }

    #[test]
    fn first_five_sectors_are_forward() {
        let forward = MovementSector::ALL
            .iter()
            .filter(|s| s.direction() == TravelDirection::Forward)
            .count();
        assert_eq!(forward, 5);
        assert_eq!(
            MovementSector::StraightBackward.direction(),
            TravelDirection::Backward
        );
    }

    #[test]
    fn from_parts_inverts_steering_and_direction() {
        for sector in MovementSector::ALL {
            assert_eq!(
                MovementSector::from_parts(sector.steering(), sector.direction()),
                sector
            );
        }
    }

    #[test]
    fn left_steering_is_negative() {
        assert!(SteeringClass::FullLeft.value() < 0.0);
        assert!(SteeringClass::SlightLeft.value() < 0.0);
        assert!(SteeringClass::SlightRight.value() > 0.0);
        assert_eq!(SteeringClass::Straight.magnitude(), 0.0);
    }

    #[test]
    fn sector_map_index_and_iter_agree() {
        let map = SectorMap::from_fn(|s| s.index() * 10);
        assert_eq!(map[MovementSector::SlightLeftBackward], 90);
        let collected: Vec<usize> = map.iter().map(|(_, v)| *v).collect();
        assert_eq!(collected, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn sector_map_map_keeps_association() {
        let map = SectorMap::from_fn(|s| s.direction());
        let signs = map.map(|_, d| d.sign());
        assert_eq!(signs[MovementSector::FullLeftForward], 1.0);
        assert_eq!(signs[MovementSector::FullLeftBackward], -1.0);
    }
}
