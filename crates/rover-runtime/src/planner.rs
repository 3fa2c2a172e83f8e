//! [`PlanningState`] – the braking/jam state machine carried between ticks.
//!
//! The control loop owns exactly one `PlanningState`.  It tracks the active
//! command, how many more ticks that command is held (`keep_for`), and how
//! many consecutive ticks the same command has been applied.
//!
//! Two decisions are taken without looking at the sensors:
//!
//! - **Brake resolution.**  A brake is held one tick at a time.  While the
//!   tracked motion still follows the braked direction the brake repeats;
//!   otherwise the vehicle is stopped.
//! - **Jam debounce.**  A full throttle applied for more than `jam_ticks`
//!   ticks while the tracker reports no net motion forces a stop held for
//!   `jam_hold_ticks` ticks.
//!
//! Everything else goes through a selection pass.
//!
//! # Example
//!
//! ```rust
//! use rover_runtime::planner::{Decision, Phase, PlanningState};
//! use rover_types::{DirectionCommand, DirectionSign, PlannerTuning};
//!
//! let tuning = PlannerTuning::default();
//! let mut state = PlanningState::new();
//! state.commit(Decision::selected(DirectionCommand::FORWARD_BRAKE));
//! state.advance(DirectionCommand::FULL_FORWARD);
//!
//! // Still rolling forward: brake again.
//! let next = state.reflex(DirectionSign::Forward, &tuning).unwrap();
//! assert_eq!(next.command, DirectionCommand::FORWARD_BRAKE);
//! assert_eq!(next.phase, Phase::Braking);
//!
//! // Stopped: release.
//! let next = state.reflex(DirectionSign::Still, &tuning).unwrap();
//! assert!(next.command.is_stop());
//! ```

use std::fmt;

use rover_types::{DirectionCommand, DirectionSign, PlannerTuning, TravelDirection};
use tracing::info;

// ────────────────────────────────────────────────────────────────────────────
// Phase / Decision
// ────────────────────────────────────────────────────────────────────────────

/// Observable state of the planner, for logging and the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Selecting,
    Braking,
    JamHold,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Selecting => "selecting",
            Phase::Braking => "braking",
            Phase::JamHold => "jam_hold",
        };
        f.write_str(name)
    }
}

/// A command together with how long to hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: DirectionCommand,
    /// Ticks before the next decision; at least `1`.
    pub keep_for: u32,
    pub phase: Phase,
}

impl Decision {
    /// Outcome of a selection pass, held for one tick.
    pub fn selected(command: DirectionCommand) -> Self {
        let phase = if command.throttle.is_brake() {
            Phase::Braking
        } else {
            Phase::Selecting
        };
        Self {
            command,
            keep_for: 1,
            phase,
        }
    }

    /// Stop for one tick.
    pub fn stop() -> Self {
        Self::selected(DirectionCommand::STOP)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PlanningState
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanningState {
    active: DirectionCommand,
    keep_for: u32,
    ticks_in_direction: u32,
    phase: Phase,
}

impl Default for PlanningState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningState {
    /// Stopped, with a decision due on the first tick.
    pub fn new() -> Self {
        Self {
            active: DirectionCommand::STOP,
            keep_for: 0,
            ticks_in_direction: 0,
            phase: Phase::Selecting,
        }
    }

    /// Command applied on the current tick.
    pub fn active(&self) -> DirectionCommand {
        self.active
    }

    pub fn keep_for(&self) -> u32 {
        self.keep_for
    }

    /// Consecutive ticks the active command has been applied unchanged,
    /// not counting the first.
    pub fn ticks_in_direction(&self) -> u32 {
        self.ticks_in_direction
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// `true` once the hold of the active command has run out.
    pub fn needs_decision(&self) -> bool {
        self.keep_for == 0
    }

    /// Decisions that do not need perception: brake resolution and jam
    /// debounce.  `None` means a selection pass is required.
    pub fn reflex(&self, tracked: DirectionSign, tuning: &PlannerTuning) -> Option<Decision> {
        let throttle = self.active.throttle;

        if let Some(braked) = throttle.braked_direction() {
            let still_moving = match braked {
                TravelDirection::Forward => tracked == DirectionSign::Forward,
                TravelDirection::Backward => tracked == DirectionSign::Backward,
            };
            return Some(if still_moving {
                Decision {
                    command: self.active,
                    keep_for: 1,
                    phase: Phase::Braking,
                }
            } else {
                Decision::stop()
            });
        }

        if throttle.drive_direction().is_some()
            && tracked == DirectionSign::Still
            && self.ticks_in_direction > tuning.jam_ticks
        {
            return Some(Decision {
                command: DirectionCommand::STOP,
                keep_for: tuning.jam_hold_ticks.max(1),
                phase: Phase::JamHold,
            });
        }

        None
    }

    /// Make `decision` the active command.
    pub fn commit(&mut self, decision: Decision) {
        if decision.phase != self.phase {
            info!(
                from = %self.phase,
                to = %decision.phase,
                command = %decision.command,
                "planner phase change"
            );
        }
        self.active = decision.command;
        self.keep_for = decision.keep_for.max(1);
        self.phase = decision.phase;
    }

    /// Replace the active command outside the normal decision cycle (gate
    /// rejection, actuator fault).  A fresh decision is due next tick.
    pub fn force(&mut self, command: DirectionCommand) {
        self.active = command;
        self.keep_for = 0;
        self.phase = Phase::Selecting;
    }

    /// End-of-tick bookkeeping.  `previous` is the command that was active
    /// before this tick's decision.
    pub fn advance(&mut self, previous: DirectionCommand) {
        self.keep_for = self.keep_for.saturating_sub(1);
        if previous == self.active {
            self.ticks_in_direction = self.ticks_in_direction.saturating_add(1);
        } else {
            self.ticks_in_direction = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::MovementSector;

    fn tuning() -> PlannerTuning {
        PlannerTuning::default()
    }

    /// Run one tick the way the control loop does, with a fixed selection
    /// result.
    fn tick(state: &mut PlanningState, tracked: DirectionSign, selection: DirectionCommand) {
        let previous = state.active();
        if state.needs_decision() {
            let decision = state
                .reflex(tracked, &tuning())
                .unwrap_or_else(|| Decision::selected(selection));
            state.commit(decision);
        }
        state.advance(previous);
    }

    #[test]
    fn starts_stopped_and_due() {
        let state = PlanningState::new();
        assert!(state.active().is_stop());
        assert!(state.needs_decision());
        assert_eq!(state.phase(), Phase::Selecting);
    }

    #[test]
    fn no_reflex_from_stop() {
        let state = PlanningState::new();
        assert!(state.reflex(DirectionSign::Still, &tuning()).is_none());
    }

    #[test]
    fn brake_repeats_while_moving_then_stops() {
        let mut state = PlanningState::new();
        state.commit(Decision::selected(DirectionCommand::FORWARD_BRAKE));
        assert_eq!(state.phase(), Phase::Braking);
        state.advance(DirectionCommand::FULL_FORWARD);

        tick(&mut state, DirectionSign::Forward, DirectionCommand::FULL_FORWARD);
        assert_eq!(state.active(), DirectionCommand::FORWARD_BRAKE);
        assert_eq!(state.ticks_in_direction(), 1);

        tick(&mut state, DirectionSign::Still, DirectionCommand::FULL_FORWARD);
        assert!(state.active().is_stop());
        assert_eq!(state.phase(), Phase::Selecting);
    }

    #[test]
    fn backward_brake_released_by_forward_sign() {
        let mut state = PlanningState::new();
        state.commit(Decision::selected(DirectionCommand::BACKWARD_BRAKE));
        let next = state.reflex(DirectionSign::Forward, &tuning()).unwrap();
        assert!(next.command.is_stop());
        let next = state.reflex(DirectionSign::Backward, &tuning()).unwrap();
        assert_eq!(next.command, DirectionCommand::BACKWARD_BRAKE);
    }

    #[test]
    fn brake_keeps_steering_when_repeated() {
        let mut state = PlanningState::new();
        let brake = DirectionCommand::new(
            MovementSector::FullLeftForward.steering(),
            rover_types::Throttle::ForwardBrake,
        );
        state.commit(Decision::selected(brake));
        let next = state.reflex(DirectionSign::Forward, &tuning()).unwrap();
        assert_eq!(next.command, brake);
        assert_eq!(next.keep_for, 1);
    }

    #[test]
    fn jam_forces_stop_held_for_four_ticks() {
        let mut state = PlanningState::new();
        let forward = DirectionCommand::FULL_FORWARD;

        // First tick switches to forward, the next four repeat it.
        for _ in 0..5 {
            tick(&mut state, DirectionSign::Still, forward);
        }
        assert_eq!(state.active(), forward);
        assert_eq!(state.ticks_in_direction(), 4);

        tick(&mut state, DirectionSign::Still, forward);
        assert!(state.active().is_stop());
        assert_eq!(state.phase(), Phase::JamHold);

        // Held for three more ticks without a decision.
        for _ in 0..3 {
            assert!(!state.needs_decision());
            tick(&mut state, DirectionSign::Still, forward);
            assert!(state.active().is_stop());
        }
        assert!(state.needs_decision());
        tick(&mut state, DirectionSign::Still, forward);
        assert_eq!(state.active(), forward);
    }

    #[test]
    fn no_jam_at_threshold() {
        let mut state = PlanningState::new();
        for _ in 0..4 {
            tick(&mut state, DirectionSign::Still, DirectionCommand::FULL_BACKWARD);
        }
        assert_eq!(state.ticks_in_direction(), 3);
        assert!(state.reflex(DirectionSign::Still, &tuning()).is_none());
    }

    #[test]
    fn no_jam_while_moving() {
        let mut state = PlanningState::new();
        for _ in 0..10 {
            tick(&mut state, DirectionSign::Forward, DirectionCommand::FULL_FORWARD);
        }
        assert_eq!(state.active(), DirectionCommand::FULL_FORWARD);
        assert_eq!(state.ticks_in_direction(), 9);
    }

    #[test]
    fn changed_command_resets_counter() {
        let mut state = PlanningState::new();
        tick(&mut state, DirectionSign::Forward, DirectionCommand::FULL_FORWARD);
        tick(&mut state, DirectionSign::Forward, DirectionCommand::FULL_FORWARD);
        assert_eq!(state.ticks_in_direction(), 1);
        let left = DirectionCommand::drive(MovementSector::SlightLeftForward);
        tick(&mut state, DirectionSign::Forward, left);
        assert_eq!(state.ticks_in_direction(), 0);
    }

    #[test]
    fn force_resets_hold() {
        let mut state = PlanningState::new();
        state.commit(Decision {
            command: DirectionCommand::STOP,
            keep_for: 4,
            phase: Phase::JamHold,
        });
        state.force(DirectionCommand::STOP);
        assert!(state.needs_decision());
        assert_eq!(state.phase(), Phase::Selecting);
    }
}
