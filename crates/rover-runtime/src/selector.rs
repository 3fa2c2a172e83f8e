//! [`DirectionSelector`] – turns a feasibility map and oracle weights into
//! exactly one [`DirectionCommand`].
//!
//! Selection order:
//!
//! 1. A full throttle whose whole half-plane became infeasible is answered
//!    with the matching brake, keeping the current steering.
//! 2. Nothing feasible at all: stop.
//! 3. Oracle weights are masked by feasibility, halved for short reach and
//!    multiplied for sectors continuing the current full throttle.  The
//!    strictly greatest positive weight wins, first in canonical order on
//!    ties.
//! 4. No positive weight: fall back to the feasible sector with the most
//!    reach, preferring the current travel direction, then the straightest
//!    steering.
//!
//! The oracle is only consulted when step 3 is reached.
//!
//! # Example
//!
//! ```
//! use rover_runtime::selector::DirectionSelector;
//! use rover_types::{DirectionCommand, Feasibility, PlannerTuning, RoverError, SectorMap};
//!
//! let selector = DirectionSelector::new(PlannerTuning::default());
//! let open = SectorMap::splat(Feasibility::open(2.0));
//! let selection = selector
//!     .select(&open, DirectionCommand::STOP, || Ok::<_, RoverError>(SectorMap::splat(1.0)))
//!     .unwrap();
//! assert_eq!(selection.command, DirectionCommand::FULL_FORWARD);
//! ```

use std::fmt;

use rover_types::{
    DirectionCommand, Feasibility, MovementSector, PlannerTuning, RoverError, SectorMap, Throttle,
    TravelDirection,
};
use tracing::debug;

/// Which rule produced a [`Selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Brake issued because the current half-plane closed.
    Brake,
    /// No sector was feasible.
    NothingFeasible,
    /// Highest adjusted oracle weight.
    Weighted,
    /// Reach-based fallback after every weight came out non-positive.
    Fallback,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionReason::Brake => "brake",
            SelectionReason::NothingFeasible => "nothing_feasible",
            SelectionReason::Weighted => "weighted",
            SelectionReason::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub command: DirectionCommand,
    /// The sector the command was derived from, `None` for brakes and stop.
    pub sector: Option<MovementSector>,
    pub reason: SelectionReason,
}

impl Selection {
    fn without_sector(command: DirectionCommand, reason: SelectionReason) -> Self {
        Self {
            command,
            sector: None,
            reason,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DirectionSelector
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSelector {
    tuning: PlannerTuning,
}

impl DirectionSelector {
    pub fn new(tuning: PlannerTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &PlannerTuning {
        &self.tuning
    }

    /// Choose the next command.
    ///
    /// `weights` is called at most once, and only when the brake and stop
    /// rules did not already decide.
    ///
    /// # Errors
    ///
    /// Whatever `weights` returns; the caller is expected to stop.
    pub fn select<F>(
        &self,
        feasibility: &SectorMap<Feasibility>,
        previous: DirectionCommand,
        weights: F,
    ) -> Result<Selection, RoverError>
    where
        F: FnOnce() -> Result<SectorMap<f32>, RoverError>,
    {
        let current = previous.throttle.drive_direction();

        if let Some(direction) = current {
            let any_open = feasibility
                .iter()
                .any(|(sector, f)| f.possible && sector.direction() == direction);
            if !any_open {
                let command = DirectionCommand::new(previous.steering, Throttle::brake(direction));
                debug!(%command, "half-plane closed, braking");
                return Ok(Selection::without_sector(command, SelectionReason::Brake));
            }
        }

        if !feasibility.iter().any(|(_, f)| f.possible) {
            debug!("no feasible sector, stopping");
            return Ok(Selection::without_sector(
                DirectionCommand::STOP,
                SelectionReason::NothingFeasible,
            ));
        }

        let adjusted = self.adjust_weights(feasibility, &weights()?, current);
        let (sector, reason) = match best_weighted(&adjusted) {
            Some(sector) => (sector, SelectionReason::Weighted),
            None => {
                let preferred = match current {
                    Some(TravelDirection::Backward) => TravelDirection::Backward,
                    _ => TravelDirection::Forward,
                };
                let Some(sector) = fallback_sector(feasibility, preferred) else {
                    return Ok(Selection::without_sector(
                        DirectionCommand::STOP,
                        SelectionReason::NothingFeasible,
                    ));
                };
                (sector, SelectionReason::Fallback)
            }
        };

        let command = translate(sector, current);
        debug!(%sector, %command, %reason, "sector selected");
        Ok(Selection {
            command,
            sector: Some(sector),
            reason,
        })
    }

    /// Apply feasibility masking and the clearance/continuity heuristics to
    /// raw oracle weights.
    pub fn adjust_weights(
        &self,
        feasibility: &SectorMap<Feasibility>,
        raw: &SectorMap<f32>,
        current: Option<TravelDirection>,
    ) -> SectorMap<f32> {
        SectorMap::from_fn(|sector| {
            let f = feasibility[sector];
            let mut weight = raw[sector];
            if !f.possible || !weight.is_finite() || weight < 0.0 {
                return 0.0;
            }
            if f.reach() < self.tuning.clearance_threshold {
                weight *= self.tuning.clearance_penalty;
            }
            if current == Some(sector.direction()) {
                weight *= self.tuning.continuity_bonus;
            }
            weight
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Strictly greatest positive weight, first in canonical order on ties.
pub fn best_weighted(weights: &SectorMap<f32>) -> Option<MovementSector> {
    let mut best: Option<(MovementSector, f32)> = None;
    for (sector, &w) in weights.iter() {
        if w > 0.0 && best.is_none_or(|(_, b)| w > b) {
            best = Some((sector, w));
        }
    }
    best.map(|(sector, _)| sector)
}

/// Feasible sector with the greatest reach, restricted to `preferred` when
/// any sector in that direction is feasible.  Ties go to the smaller
/// steering magnitude, then to canonical order.
pub fn fallback_sector(
    feasibility: &SectorMap<Feasibility>,
    preferred: TravelDirection,
) -> Option<MovementSector> {
    let feasible = || feasibility.iter().filter(|(_, f)| f.possible);
    let restricted = feasible().any(|(s, _)| s.direction() == preferred);

    let mut best: Option<(MovementSector, f32)> = None;
    for (sector, f) in feasible() {
        if restricted && sector.direction() != preferred {
            continue;
        }
        let better = match best {
            None => true,
            Some((b, reach)) => {
                f.reach() > reach
                    || (f.reach() == reach
                        && sector.steering().magnitude() < b.steering().magnitude())
            }
        };
        if better {
            best = Some((sector, f.reach()));
        }
    }
    best.map(|(sector, _)| sector)
}

/// Command driving along `sector`; reversing a full throttle becomes the
/// matching brake.
pub fn translate(sector: MovementSector, current: Option<TravelDirection>) -> DirectionCommand {
    let throttle = match current {
        Some(direction) if direction != sector.direction() => Throttle::brake(direction),
        _ => Throttle::drive(sector.direction()),
    };
    DirectionCommand::new(sector.steering(), throttle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::SteeringClass;

    fn selector() -> DirectionSelector {
        DirectionSelector::new(PlannerTuning::default())
    }

    fn uniform() -> Result<SectorMap<f32>, RoverError> {
        Ok(SectorMap::splat(1.0))
    }

    fn zero() -> Result<SectorMap<f32>, RoverError> {
        Ok(SectorMap::splat(0.0))
    }

    fn only(open: &[(MovementSector, f32)]) -> SectorMap<Feasibility> {
        let mut map = SectorMap::splat(Feasibility::BLOCKED);
        for &(sector, clearance) in open {
            map[sector] = Feasibility::open(clearance);
        }
        map
    }

    #[test]
    fn clear_field_uniform_weights_goes_straight_forward() {
        let open = SectorMap::from_fn(|s| Feasibility::open(2.0 * s.direction().sign()));
        let sel = selector().select(&open, DirectionCommand::STOP, uniform).unwrap();
        assert_eq!(sel.command, DirectionCommand::FULL_FORWARD);
        assert_eq!(sel.sector, Some(MovementSector::StraightForward));
        assert_eq!(sel.reason, SelectionReason::Weighted);
    }

    #[test]
    fn forward_blocked_while_driving_forward_brakes() {
        let map = only(&[(MovementSector::StraightBackward, -1.5)]);
        let previous = DirectionCommand::drive(MovementSector::SlightLeftForward);
        let sel = selector()
            .select(&map, previous, || -> Result<SectorMap<f32>, RoverError> {
                panic!("oracle must not be consulted")
            })
            .unwrap();
        assert_eq!(sel.reason, SelectionReason::Brake);
        assert_eq!(sel.command.throttle, Throttle::ForwardBrake);
        assert_eq!(sel.command.steering, SteeringClass::SlightLeft);
    }

    #[test]
    fn backward_blocked_while_reversing_brakes() {
        let map = only(&[(MovementSector::StraightForward, 1.5)]);
        let sel = selector()
            .select(&map, DirectionCommand::FULL_BACKWARD, uniform)
            .unwrap();
        assert_eq!(sel.command, DirectionCommand::BACKWARD_BRAKE);
    }

    #[test]
    fn nothing_feasible_stops() {
        let map = SectorMap::splat(Feasibility::BLOCKED);
        let sel = selector().select(&map, DirectionCommand::STOP, uniform).unwrap();
        assert!(sel.command.is_stop());
        assert_eq!(sel.reason, SelectionReason::NothingFeasible);
    }

    #[test]
    fn reversal_from_full_throttle_becomes_brake() {
        // Forward still has a feasible sector, but the oracle prefers going
        // back.
        let map = only(&[
            (MovementSector::FullRightForward, 0.3),
            (MovementSector::StraightBackward, -2.0),
        ]);
        let mut weights = SectorMap::splat(0.0);
        weights[MovementSector::FullRightForward] = 0.1;
        weights[MovementSector::StraightBackward] = 10.0;
        let sel = selector()
            .select(&map, DirectionCommand::FULL_FORWARD, || Ok(weights))
            .unwrap();
        assert_eq!(sel.sector, Some(MovementSector::StraightBackward));
        assert_eq!(sel.command, DirectionCommand::FORWARD_BRAKE);
    }

    #[test]
    fn continuity_bonus_keeps_direction() {
        let map = only(&[
            (MovementSector::SlightRightBackward, -2.0),
            (MovementSector::StraightForward, 2.0),
        ]);
        let mut weights = SectorMap::splat(1.0);
        weights[MovementSector::StraightForward] = 3.0;
        let sel = selector()
            .select(&map, DirectionCommand::FULL_BACKWARD, || Ok(weights))
            .unwrap();
        // 1.0 * 4 beats 3.0.
        assert_eq!(sel.sector, Some(MovementSector::SlightRightBackward));
        assert_eq!(sel.command.throttle, Throttle::Backward);
    }

    #[test]
    fn short_reach_halves_weight() {
        let map = only(&[
            (MovementSector::StraightForward, 0.45),
            (MovementSector::SlightLeftForward, 1.0),
        ]);
        let mut weights = SectorMap::splat(0.0);
        weights[MovementSector::StraightForward] = 1.5;
        weights[MovementSector::SlightLeftForward] = 1.0;
        let adjusted = selector().adjust_weights(&map, &weights, None);
        assert!((adjusted[MovementSector::StraightForward] - 0.75).abs() < 1e-6);
        let sel = selector().select(&map, DirectionCommand::STOP, || Ok(weights)).unwrap();
        assert_eq!(sel.sector, Some(MovementSector::SlightLeftForward));
    }

    #[test]
    fn invalid_weights_count_as_zero() {
        let map = SectorMap::splat(Feasibility::open(1.0));
        let mut raw = SectorMap::splat(-1.0);
        raw[MovementSector::FullLeftBackward] = f32::NAN;
        raw[MovementSector::FullRightForward] = f32::INFINITY;
        let adjusted = selector().adjust_weights(&map, &raw, None);
        assert!(adjusted.iter().all(|(_, w)| *w == 0.0));
    }

    #[test]
    fn weight_ties_go_to_first_in_canonical_order() {
        let map = SectorMap::splat(Feasibility::open(1.0));
        let mut weights = SectorMap::splat(0.0);
        weights[MovementSector::SlightLeftForward] = 2.0;
        weights[MovementSector::FullLeftForward] = 2.0;
        assert_eq!(best_weighted(&weights), Some(MovementSector::FullLeftForward));
        let sel = selector().select(&map, DirectionCommand::STOP, || Ok(weights)).unwrap();
        assert_eq!(sel.sector, Some(MovementSector::FullLeftForward));
    }

    #[test]
    fn fallback_prefers_straighter_on_equal_reach() {
        let map = only(&[
            (MovementSector::FullLeftForward, 1.2),
            (MovementSector::SlightRightForward, 1.2),
        ]);
        let sel = selector().select(&map, DirectionCommand::STOP, zero).unwrap();
        assert_eq!(sel.reason, SelectionReason::Fallback);
        assert_eq!(sel.sector, Some(MovementSector::SlightRightForward));
    }

    #[test]
    fn fallback_prefers_more_reach() {
        let map = only(&[
            (MovementSector::StraightForward, 0.6),
            (MovementSector::FullRightForward, 1.4),
        ]);
        assert_eq!(
            fallback_sector(&map, TravelDirection::Forward),
            Some(MovementSector::FullRightForward)
        );
    }

    #[test]
    fn fallback_stays_in_preferred_direction() {
        let map = only(&[
            (MovementSector::StraightForward, 1.9),
            (MovementSector::FullLeftBackward, -0.6),
        ]);
        let sel = selector()
            .select(&map, DirectionCommand::FULL_BACKWARD, zero)
            .unwrap();
        assert_eq!(sel.sector, Some(MovementSector::FullLeftBackward));
        assert_eq!(sel.command.throttle, Throttle::Backward);
    }

    #[test]
    fn fallback_widens_when_preferred_direction_closed() {
        let map = only(&[(MovementSector::StraightBackward, -0.8)]);
        let sel = selector().select(&map, DirectionCommand::STOP, zero).unwrap();
        assert_eq!(sel.sector, Some(MovementSector::StraightBackward));
        assert_eq!(sel.command, DirectionCommand::FULL_BACKWARD);
    }

    #[test]
    fn oracle_error_propagates() {
        let map = SectorMap::splat(Feasibility::open(1.0));
        let err = selector()
            .select(&map, DirectionCommand::STOP, || {
                Err(RoverError::OracleFailed("down".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, RoverError::OracleFailed(_)));
    }

    #[test]
    fn selected_command_is_always_feasible() {
        let map = only(&[(MovementSector::SlightLeftBackward, -1.0)]);
        let weights = SectorMap::from_fn(|s| s.index() as f32);
        let sel = selector().select(&map, DirectionCommand::STOP, || Ok(weights)).unwrap();
        let sector = sel.command.sector().unwrap();
        assert!(map[sector].possible);
    }
}
